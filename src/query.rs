use chrono::NaiveDate;

use crate::types::{DriveEntry, Inventory};

pub const DEFAULT_DATE_FORMAT: &str = "%d.%m.%Y";

/// Filter over an inventory
///
/// The name part is a case-insensitive substring match. The date part is a
/// literal, case-sensitive substring match of a formatted date against the
/// entry name; it is not a date comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub name: String,
    pub date_token: Option<String>,
    pub date_filter: bool,
}

impl SearchQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            date_token: None,
            date_filter: false,
        }
    }

    /// Require the name to contain `token` as well
    pub fn with_date_token(mut self, token: impl Into<String>) -> Self {
        self.date_token = Some(token.into());
        self.date_filter = true;
        self
    }

    /// Require the name to contain `date` rendered with `format`
    pub fn with_date(self, date: NaiveDate, format: &str) -> Self {
        self.with_date_token(date_token(date, format))
    }

    pub fn matches(&self, entry: &DriveEntry) -> bool {
        let name_lower = self.name.to_lowercase();
        self.matches_lowered(entry, &name_lower)
    }

    fn matches_lowered(&self, entry: &DriveEntry, name_lower: &str) -> bool {
        let match_name = entry.name.to_lowercase().contains(name_lower);
        let match_date = match (&self.date_token, self.date_filter) {
            (Some(token), true) => entry.name.contains(token.as_str()),
            _ => true,
        };
        match_name && match_date
    }
}

/// Render a date the way it appears in file names
pub fn date_token(date: NaiveDate, format: &str) -> String {
    date.format(format).to_string()
}

/// Entries of `inventory` matching `query`, in their original order
pub fn search(inventory: &Inventory, query: &SearchQuery) -> Inventory {
    let name_lower = query.name.to_lowercase();
    inventory
        .iter()
        .filter(|entry| query.matches_lowered(entry, &name_lower))
        .cloned()
        .collect()
}
