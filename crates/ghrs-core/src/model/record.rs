use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Export column names as the portal spells them.
pub mod columns {
    pub const EMPLOYEE_ID: &str = "EMPLID";
    pub const RECORD_NUMBER: &str = "EMPL_RCD";
    pub const FIRST_NAME: &str = "FIRST_NAME";
    pub const LAST_NAME: &str = "LAST_NAME";
    pub const HOURS: &str = "TL_QUANTITY";
    pub const WORK_DATE: &str = "DUR";
    pub const ACCOUNT_CODE: &str = "ACCT_CD";
    pub const COMPANY_CODE: &str = "COMPANY";
    pub const USER_FIELD_2: &str = "USER_FIELD_2";
    pub const USER_FIELD_3: &str = "USER_FIELD_3";
    pub const USER_FIELD_5: &str = "USER_FIELD_5";
}

/// One `row` of an export, untyped and in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    cells: Vec<(String, Option<String>)>,
}

impl ExportRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column. A repeated column keeps its position and takes the newer text.
    pub fn push(&mut self, column: impl Into<String>, text: Option<String>) {
        let column = column.into();
        match self.cells.iter_mut().find(|(c, _)| *c == column) {
            Some((_, t)) => *t = text,
            None => self.cells.push((column, text)),
        }
    }

    /// `None` when the column is absent, `Some(None)` when it is present but empty.
    pub fn get(&self, column: &str) -> Option<Option<&str>> {
        self.cells
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, t)| t.as_deref())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// One day of logged time for one employee record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimesheetRecord {
    pub employee_id: String,
    pub record_number: String,
    pub first_name: String,
    pub last_name: String,
    /// Logged hours. Zero and negative values are kept as reported.
    pub hours: f64,
    pub work_date: NaiveDate,
    pub account_code: String,
    pub company_code: String,
    pub user_field_2: String,
    pub user_field_3: String,
    pub user_field_5: String,
}

/// Fields records are grouped by when summarizing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SummaryKey {
    pub employee_id: String,
    pub record_number: String,
    pub first_name: String,
    pub last_name: String,
    pub account_code: String,
    pub user_field_2: String,
    pub user_field_3: String,
    pub user_field_5: String,
}

/// Hours of one grouping key summed over a Monday-starting week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    #[serde(flatten)]
    pub key: SummaryKey,
    /// Monday that starts the bucket.
    pub week_start: NaiveDate,
    pub hours: f64,
}

/// Anything that can be bucketed into a [`WeeklySummary`].
pub trait WorkEntry {
    fn summary_key(&self) -> SummaryKey;
    fn date(&self) -> NaiveDate;
    fn hours(&self) -> f64;
}

impl TimesheetRecord {
    pub fn summary_key(&self) -> SummaryKey {
        SummaryKey {
            employee_id: self.employee_id.clone(),
            record_number: self.record_number.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            account_code: self.account_code.clone(),
            user_field_2: self.user_field_2.clone(),
            user_field_3: self.user_field_3.clone(),
            user_field_5: self.user_field_5.clone(),
        }
    }

    /// Full name as "First Last".
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

impl WorkEntry for TimesheetRecord {
    fn summary_key(&self) -> SummaryKey {
        TimesheetRecord::summary_key(self)
    }

    fn date(&self) -> NaiveDate {
        self.work_date
    }

    fn hours(&self) -> f64 {
        self.hours
    }
}

impl WorkEntry for WeeklySummary {
    fn summary_key(&self) -> SummaryKey {
        self.key.clone()
    }

    fn date(&self) -> NaiveDate {
        self.week_start
    }

    fn hours(&self) -> f64 {
        self.hours
    }
}
