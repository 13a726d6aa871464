//! Product categories and the products filed under them.

use serde::{Deserialize, Serialize};

use crate::{
    errors::ModelError,
    id::RecordId,
    schema::{Associated, Draft, Record, Schema},
    validate::{required_positive, required_text},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: RecordId,
    pub name: String,
}

impl Record for Category {
    const KIND: &'static str = "category";

    fn id(&self) -> RecordId {
        self.id
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewCategory {
    #[serde(default)]
    pub name: Option<String>,
}

impl Draft for NewCategory {
    type Record = Category;

    fn into_record(self, id: RecordId) -> Result<Category, ModelError> {
        Ok(Category { id, name: required_text("name", self.name)? })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: RecordId,
    pub name: String,
    pub price: f64,
    pub category_id: Option<RecordId>,
}

impl Record for Product {
    const KIND: &'static str = "product";

    fn id(&self) -> RecordId {
        self.id
    }
}

impl Associated for Product {
    const REF_FIELD: &'static str = "category_id";

    fn primary_ref(&self) -> Option<RecordId> {
        self.category_id
    }

    fn set_primary_ref(&mut self, primary: Option<RecordId>) {
        self.category_id = primary;
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewProduct {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
}

impl Draft for NewProduct {
    type Record = Product;

    fn into_record(self, id: RecordId) -> Result<Product, ModelError> {
        Ok(Product {
            id,
            name: required_text("name", self.name)?,
            price: required_positive("price", self.price)?,
            category_id: None,
        })
    }
}

/// Categories (primary) and products (secondary, `category_id`).
pub struct Catalog;

impl Schema for Catalog {
    const NAME: &'static str = "catalog";
    const PRIMARY_PATH: &'static str = "categories";
    const SECONDARY_PATH: &'static str = "products";
    const ASSIGN_FIELD: &'static str = "product_id";

    type Primary = Category;
    type Secondary = Product;
    type NewPrimary = NewCategory;
    type NewSecondary = NewProduct;
}
