use log::debug;
use std::collections::HashSet;

use crate::config::*;

/// The ordered, immutable list of items of a questionnaire.
///
/// Invariant: ids are unique and there is at least one item.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Catalog {
    items: Vec<Item>,
}

impl Catalog {
    pub fn new(items: Vec<Item>) -> Result<Catalog, SurveyError> {
        if items.is_empty() {
            return Err(SurveyError::EmptyCatalog);
        }
        let mut seen: HashSet<&str> = HashSet::new();
        for item in items.iter() {
            if !seen.insert(item.id.as_str()) {
                return Err(SurveyError::DuplicateItem(item.id.clone()));
            }
        }
        debug!("Catalog::new: {} items", items.len());
        Ok(Catalog { items })
    }

    /// The essential factors inventory: 10 items in 5 dimensions, the last
    /// two of them reverse-scored.
    pub fn builtin() -> Catalog {
        let items = vec![
            Item::new(
                "Rewards and Benefits",
                "RE01",
                "The rewards and benefits policy is fair and clear.",
                false,
            ),
            Item::new(
                "Rewards and Benefits",
                "RE02",
                "Pay is in line with the responsibilities of the position.",
                false,
            ),
            Item::new(
                "Health and Safety",
                "SE01",
                "Working conditions protect my health and safety.",
                false,
            ),
            Item::new(
                "Health and Safety",
                "SE02",
                "The company invests in accident prevention and safety training.",
                false,
            ),
            Item::new(
                "Recognition and Appreciation",
                "RC01",
                "My effort and results are recognized often.",
                false,
            ),
            Item::new(
                "Recognition and Appreciation",
                "RC02",
                "I feel my contributions are valued by leadership.",
                false,
            ),
            Item::new(
                "Balance and Quality of Life",
                "EQ01",
                "I balance my personal and professional responsibilities well.",
                false,
            ),
            Item::new(
                "Balance and Quality of Life",
                "EQ02",
                "Working hours and pace allow for a good quality of life.",
                false,
            ),
            Item::new(
                "Risk Factors (Reversed)",
                "EX01",
                "I often sacrifice my personal life because of excessive work.",
                true,
            ),
            Item::new(
                "Risk Factors (Reversed)",
                "EX02",
                "Recognition happens rarely or unevenly.",
                true,
            ),
        ];
        Catalog { items }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false, kept for symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, item_id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.get(item_id).is_some()
    }

    /// The block names, in the order they first appear in the catalog.
    pub fn blocks(&self) -> Vec<String> {
        let mut res: Vec<String> = Vec::new();
        for item in self.items.iter() {
            if !res.contains(&item.block) {
                res.push(item.block.clone());
            }
        }
        res
    }

    /// The items of one block, in catalog order.
    pub fn block_items<'a>(&'a self, block: &'a str) -> impl Iterator<Item = &'a Item> + 'a {
        self.items.iter().filter(move |i| i.block == block)
    }
}
