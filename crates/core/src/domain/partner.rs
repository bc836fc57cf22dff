use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartnerId(pub String);

impl fmt::Display for PartnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A customer record. Contacts hang off a company through `parent_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub id: PartnerId,
    pub name: String,
    pub parent_id: Option<PartnerId>,
    pub is_company: bool,
}

/// Parent/child view over a set of partners.
///
/// The commercial partner of a contact is the first partner flagged
/// `is_company` when walking up from the contact itself, or the topmost
/// ancestor when no partner on the chain is a company.
#[derive(Clone, Debug, Default)]
pub struct PartnerHierarchy {
    partners: HashMap<PartnerId, Partner>,
}

impl PartnerHierarchy {
    pub fn new(partners: impl IntoIterator<Item = Partner>) -> Self {
        Self { partners: partners.into_iter().map(|partner| (partner.id.clone(), partner)).collect() }
    }

    pub fn insert(&mut self, partner: Partner) {
        self.partners.insert(partner.id.clone(), partner);
    }

    pub fn get(&self, id: &PartnerId) -> Option<&Partner> {
        self.partners.get(id)
    }

    pub fn commercial_partner_of(&self, id: &PartnerId) -> Option<PartnerId> {
        let mut current = self.partners.get(id)?;
        let mut visited = HashSet::new();

        loop {
            if current.is_company || !visited.insert(current.id.clone()) {
                return Some(current.id.clone());
            }
            match current.parent_id.as_ref().and_then(|parent| self.partners.get(parent)) {
                Some(parent) => current = parent,
                None => return Some(current.id.clone()),
            }
        }
    }

    /// `root` plus every transitive descendant, sorted by id.
    pub fn child_of(&self, root: &PartnerId) -> Vec<PartnerId> {
        if !self.partners.contains_key(root) {
            return Vec::new();
        }

        let mut children: HashMap<&PartnerId, Vec<&PartnerId>> = HashMap::new();
        for partner in self.partners.values() {
            if let Some(parent) = &partner.parent_id {
                children.entry(parent).or_default().push(&partner.id);
            }
        }

        let mut seen: HashSet<PartnerId> = HashSet::new();
        let mut stack = vec![root];
        while let Some(next) = stack.pop() {
            if !seen.insert(next.clone()) {
                continue;
            }
            if let Some(kids) = children.get(next) {
                stack.extend(kids.iter().copied());
            }
        }

        let mut ids: Vec<PartnerId> = seen.into_iter().collect();
        ids.sort();
        ids
    }
}
