use chrono::{Local, NaiveDate};

use crate::config::PortalConfig;
use crate::credentials::Credentials;
use crate::error::Result;
use crate::export;
use crate::model::{TimesheetRecord, WeeklySummary};
use crate::query::{QueryDriver, QueryWindow};
use crate::session::{Authenticator, Session};
use crate::summary;
use crate::window::{self, DateRange};

/// Authenticated connection to the portal with the query helpers on top.
///
/// Every query method returns `Ok(vec![])` for an empty answer and `Err`
/// for a failure. A stale session shows up as an error for which
/// [`GhrsError::is_stale_session`](crate::error::GhrsError::is_stale_session)
/// is true; call [`reauthenticate`](Self::reauthenticate) and retry.
#[derive(Debug)]
pub struct GhrsClient {
    authenticator: Authenticator,
    driver: QueryDriver,
    credentials: Credentials,
    session: Session,
}

impl GhrsClient {
    /// Authenticate once and keep the resulting session.
    pub fn connect(config: &PortalConfig, credentials: Credentials) -> Result<Self> {
        let authenticator = Authenticator::new(config)?;
        let driver = QueryDriver::new(config)?;
        let session = authenticator.authenticate(&credentials)?;
        Ok(Self {
            authenticator,
            driver,
            credentials,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Replace the session with a freshly authenticated one.
    pub fn reauthenticate(&mut self) -> Result<()> {
        self.session = self.authenticator.authenticate(&self.credentials)?;
        Ok(())
    }

    /// Run one query and return the raw XML export.
    pub fn fetch_export(&self, window: &QueryWindow) -> Result<String> {
        self.driver.fetch_export(&self.session, window)
    }

    /// Records for an explicit window.
    pub fn query(&self, window: &QueryWindow) -> Result<Vec<TimesheetRecord>> {
        self.query_with(window, |_| Ok(()))
    }

    /// Like [`query`](Self::query), handing the raw export to `on_export`
    /// before it is parsed.
    pub fn query_with<F>(&self, window: &QueryWindow, on_export: F) -> Result<Vec<TimesheetRecord>>
    where
        F: FnOnce(&str) -> Result<()>,
    {
        let xml = self.fetch_export(window)?;
        on_export(&xml)?;
        let records = export::parse(&xml)?;
        tracing::info!(
            records = records.len(),
            start = %window.start(),
            end = %window.end(),
            "timesheet query complete"
        );
        Ok(records)
    }

    /// Records between `start` and `end` inclusive.
    pub fn get_data(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        cost_center: &str,
        company_code: &str,
    ) -> Result<Vec<TimesheetRecord>> {
        let window = QueryWindow::new(start, end, cost_center, company_code)?;
        self.query(&window)
    }

    /// Eight weeks either side of the current week.
    pub fn get_recent_data(
        &self,
        cost_center: &str,
        company_code: &str,
    ) -> Result<Vec<TimesheetRecord>> {
        self.get_range(window::recent(today())?, cost_center, company_code)
    }

    pub fn get_data_by_weeks(
        &self,
        weeks: u32,
        cost_center: &str,
        company_code: &str,
    ) -> Result<Vec<TimesheetRecord>> {
        self.get_range(window::by_weeks(today(), weeks)?, cost_center, company_code)
    }

    pub fn get_data_by_months(
        &self,
        months: u32,
        cost_center: &str,
        company_code: &str,
    ) -> Result<Vec<TimesheetRecord>> {
        self.get_range(
            window::by_months(today(), months)?,
            cost_center,
            company_code,
        )
    }

    /// From this week's date in `year` until four weeks ahead.
    pub fn get_data_by_year(
        &self,
        year: i32,
        cost_center: &str,
        company_code: &str,
    ) -> Result<Vec<TimesheetRecord>> {
        self.get_range(window::by_year(today(), year)?, cost_center, company_code)
    }

    pub fn summarize_by_week(&self, records: &[TimesheetRecord]) -> Vec<WeeklySummary> {
        summary::summarize_by_week(records)
    }

    fn get_range(
        &self,
        range: DateRange,
        cost_center: &str,
        company_code: &str,
    ) -> Result<Vec<TimesheetRecord>> {
        self.get_data(range.start, range.end, cost_center, company_code)
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
