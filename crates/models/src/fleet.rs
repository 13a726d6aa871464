//! Drivers and the buses they are assigned to.

use serde::{Deserialize, Serialize};

use crate::{
    errors::ModelError,
    id::RecordId,
    schema::{Associated, Draft, Record, Schema},
    validate::{required_positive, required_text},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    pub id: RecordId,
    pub name: String,
    pub birth_date: String,
    pub license_number: String,
}

impl Record for Driver {
    const KIND: &'static str = "driver";

    fn id(&self) -> RecordId {
        self.id
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewDriver {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub license_number: Option<String>,
}

impl Draft for NewDriver {
    type Record = Driver;

    fn into_record(self, id: RecordId) -> Result<Driver, ModelError> {
        Ok(Driver {
            id,
            name: required_text("name", self.name)?,
            birth_date: required_text("birth_date", self.birth_date)?,
            license_number: required_text("license_number", self.license_number)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bus {
    pub id: RecordId,
    pub plate: String,
    pub model: String,
    pub manufacture_year: u32,
    pub capacity: u32,
    pub driver_id: Option<RecordId>,
}

impl Record for Bus {
    const KIND: &'static str = "bus";

    fn id(&self) -> RecordId {
        self.id
    }
}

impl Associated for Bus {
    const REF_FIELD: &'static str = "driver_id";

    fn primary_ref(&self) -> Option<RecordId> {
        self.driver_id
    }

    fn set_primary_ref(&mut self, primary: Option<RecordId>) {
        self.driver_id = primary;
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewBus {
    #[serde(default)]
    pub plate: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub manufacture_year: Option<u32>,
    #[serde(default)]
    pub capacity: Option<u32>,
}

impl Draft for NewBus {
    type Record = Bus;

    fn into_record(self, id: RecordId) -> Result<Bus, ModelError> {
        Ok(Bus {
            id,
            plate: required_text("plate", self.plate)?,
            model: required_text("model", self.model)?,
            manufacture_year: required_positive("manufacture_year", self.manufacture_year)?,
            capacity: required_positive("capacity", self.capacity)?,
            driver_id: None,
        })
    }
}

/// Drivers (primary) and buses (secondary, `driver_id`).
pub struct Fleet;

impl Schema for Fleet {
    const NAME: &'static str = "fleet";
    const PRIMARY_PATH: &'static str = "drivers";
    const SECONDARY_PATH: &'static str = "buses";
    const ASSIGN_FIELD: &'static str = "bus_id";

    type Primary = Driver;
    type Secondary = Bus;
    type NewPrimary = NewDriver;
    type NewSecondary = NewBus;
}
