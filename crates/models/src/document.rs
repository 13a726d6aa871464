//! The persisted document: both collections in one JSON object.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    errors::ModelError,
    id::RecordId,
    schema::{Associated, Record},
    view::AssociatedView,
};

/// Both collections, in creation order. Serialized as
/// `{"primaryEntities": [...], "secondaryEntities": [...]}`; both keys are
/// required on read and always written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document<P, S> {
    #[serde(rename = "primaryEntities")]
    pub primary: Vec<P>,
    #[serde(rename = "secondaryEntities")]
    pub secondary: Vec<S>,
}

impl<P, S> Default for Document<P, S> {
    fn default() -> Self {
        Self { primary: Vec::new(), secondary: Vec::new() }
    }
}

impl<P: Record, S: Associated> Document<P, S> {
    pub fn primary(&self, id: RecordId) -> Option<&P> {
        self.primary.iter().find(|p| p.id() == id)
    }

    pub fn secondary(&self, id: RecordId) -> Option<&S> {
        self.secondary.iter().find(|s| s.id() == id)
    }

    pub fn secondary_mut(&mut self, id: RecordId) -> Option<&mut S> {
        self.secondary.iter_mut().find(|s| s.id() == id)
    }

    /// Secondary records whose association field points at `primary`.
    pub fn referrers(&self, primary: RecordId) -> impl Iterator<Item = &S> {
        self.secondary.iter().filter(move |s| s.primary_ref() == Some(primary))
    }

    /// Merged view of a secondary record with its primary resolved.
    pub fn view(&self, secondary: &S) -> AssociatedView<S, P> {
        let primary = secondary.primary_ref().and_then(|id| self.primary(id)).cloned();
        AssociatedView { record: secondary.clone(), primary }
    }

    /// Check the cross-collection invariants: ids unique per collection and
    /// every association pointing at an existing primary record.
    pub fn verify(&self) -> Result<(), ModelError> {
        let mut seen = HashSet::with_capacity(self.primary.len());
        for p in &self.primary {
            if !seen.insert(p.id()) {
                return Err(ModelError::Integrity(format!("duplicate {} id {}", P::KIND, p.id())));
            }
        }
        let primaries = seen;

        let mut seen = HashSet::with_capacity(self.secondary.len());
        for s in &self.secondary {
            if !seen.insert(s.id()) {
                return Err(ModelError::Integrity(format!("duplicate {} id {}", S::KIND, s.id())));
            }
            if let Some(target) = s.primary_ref() {
                if !primaries.contains(&target) {
                    return Err(ModelError::Integrity(format!(
                        "{} {} references missing {} {}",
                        S::KIND,
                        s.id(),
                        P::KIND,
                        target
                    )));
                }
            }
        }
        Ok(())
    }
}
