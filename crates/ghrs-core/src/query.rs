//! The two-step query protocol: submit the query form, then ask the
//! results page for its XML download.
//!
//! The portal keeps per-session state in hidden form fields, so every POST
//! resubmits all fields of the page it was scraped from and overrides only
//! the few that select what to run.

use chrono::NaiveDate;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT_LANGUAGE, CONTENT_TYPE, DNT, ORIGIN, REFERER,
};
use reqwest::{StatusCode, Url};

use crate::config::PortalConfig;
use crate::error::{GhrsError, QueryPhase, Result};
use crate::form::{extract_form, FormSnapshot};
use crate::session::{redirect_target, Page, Session};

pub const IC_ACTION: &str = "ICAction";
/// `ICAction` value that runs the query with the submitted prompts.
pub const CONFIRM_QUERY: &str = "#ICOK";
/// `ICAction` value that turns the results page into an XML download.
pub const DOWNLOAD_XML: &str = "#ICQryDownloadXML";
pub const START_DATE_FIELD: &str = "InputKeys_bind1";
pub const END_DATE_FIELD: &str = "InputKeys_bind2";
pub const COST_CENTER_FIELD: &str = "InputKeys_ACCT_CD";
pub const COMPANY_CODE_FIELD: &str = "InputKeys_COMPANY";

/// Date format of the query prompts.
pub const PROMPT_DATE_FORMAT: &str = "%Y/%m/%d";

/// 302s followed after a form POST before its answer is judged.
pub const MAX_FORM_REDIRECTS: usize = 10;

/// Date range and filter keys of one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryWindow {
    start: NaiveDate,
    end: NaiveDate,
    cost_center: String,
    company_code: String,
}

impl QueryWindow {
    pub fn new(
        start: NaiveDate,
        end: NaiveDate,
        cost_center: impl Into<String>,
        company_code: impl Into<String>,
    ) -> Result<Self> {
        if start > end {
            return Err(GhrsError::InvalidInput(format!(
                "query window starts after it ends ({start} > {end})"
            )));
        }
        Ok(Self {
            start,
            end,
            cost_center: cost_center.into(),
            company_code: company_code.into(),
        })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn cost_center(&self) -> &str {
        &self.cost_center
    }

    pub fn company_code(&self) -> &str {
        &self.company_code
    }

    /// Fields set on the landing page form before running the query.
    pub fn render_overrides(&self) -> [(&'static str, String); 5] {
        [
            (IC_ACTION, CONFIRM_QUERY.to_string()),
            (
                START_DATE_FIELD,
                self.start.format(PROMPT_DATE_FORMAT).to_string(),
            ),
            (
                END_DATE_FIELD,
                self.end.format(PROMPT_DATE_FORMAT).to_string(),
            ),
            (COST_CENTER_FIELD, self.cost_center.clone()),
            (COMPANY_CODE_FIELD, self.company_code.clone()),
        ]
    }
}

/// Fields set on the results page form to request the XML export.
pub fn export_overrides() -> [(&'static str, &'static str); 1] {
    [(IC_ACTION, DOWNLOAD_XML)]
}

/// Runs queries over an authenticated [`Session`].
///
/// A 302 answer to a form POST is followed with GETs on the same session,
/// up to [`MAX_FORM_REDIRECTS`] times; only the final answer must be 200.
#[derive(Debug, Clone)]
pub struct QueryDriver {
    headers: HeaderMap,
}

impl QueryDriver {
    pub fn new(config: &PortalConfig) -> Result<Self> {
        let entry = Url::parse(&config.entry_url)
            .map_err(|e| GhrsError::Config(format!("portal.entry_url: {e}")))?;
        Ok(Self {
            headers: portal_headers(&entry, &config.accept_language)?,
        })
    }

    /// Headers sent with every form POST.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Run the query described by `window` and return the raw XML export.
    ///
    /// Starts from the session's landing page every time; the session is
    /// not modified.
    pub fn fetch_export(&self, session: &Session, window: &QueryWindow) -> Result<String> {
        let landing = session.landing();
        let form = extract_form(&landing.body)
            .ok_or(GhrsError::NoForm {
                phase: QueryPhase::Render,
            })?
            .overlay(window.render_overrides());
        tracing::debug!(
            start = %window.start(),
            end = %window.end(),
            cost_center = window.cost_center(),
            company_code = window.company_code(),
            "submitting query"
        );
        let results = self.submit(session, &landing.url, &form, QueryPhase::Render)?;

        let form = extract_form(&results.body)
            .ok_or(GhrsError::NoForm {
                phase: QueryPhase::Export,
            })?
            .overlay(export_overrides());
        let export = self.submit(session, &results.url, &form, QueryPhase::Export)?;

        tracing::debug!(bytes = export.body.len(), "export downloaded");
        Ok(export.body)
    }

    fn submit(
        &self,
        session: &Session,
        page_url: &Url,
        form: &FormSnapshot,
        phase: QueryPhase,
    ) -> Result<Page> {
        let target = page_url.join(form.action()).map_err(|e| {
            GhrsError::InvalidInput(format!("bad form action '{}': {e}", form.action()))
        })?;
        let fields: Vec<(&str, &str)> = form.fields().collect();
        let body = serde_urlencoded::to_string(&fields)
            .map_err(|e| GhrsError::InvalidInput(format!("cannot encode form fields: {e}")))?;

        tracing::debug!(%phase, url = %target, fields = fields.len(), "form post");
        let mut response = session
            .client()
            .post(target.clone())
            .headers(self.headers.clone())
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .body(body)
            .send()
            .map_err(|source| GhrsError::QueryTransport { phase, source })?;

        let mut current = target;
        for _ in 0..MAX_FORM_REDIRECTS {
            if response.status() != StatusCode::FOUND {
                break;
            }
            let Some(next) = redirect_target(&current, &response) else {
                break;
            };
            tracing::debug!(%phase, url = %next, "following form redirect");
            response = session
                .client()
                .get(next.clone())
                .send()
                .map_err(|source| GhrsError::QueryTransport { phase, source })?;
            current = next;
        }

        let status = response.status();
        if status != StatusCode::OK {
            return Err(GhrsError::QueryHttp {
                phase,
                status: status.as_u16(),
            });
        }

        let url = response.url().clone();
        let body = response
            .text()
            .map_err(|source| GhrsError::QueryTransport { phase, source })?;
        Ok(Page {
            url,
            status: status.as_u16(),
            body,
        })
    }
}

/// Browser-like headers the portal expects on form posts.
fn portal_headers(entry: &Url, accept_language: &str) -> Result<HeaderMap> {
    let invalid = |name: &str, e: reqwest::header::InvalidHeaderValue| {
        GhrsError::Config(format!("invalid {name} header value: {e}"))
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("sec-ch-ua"),
        HeaderValue::from_static(
            r#"" Not A;Brand";v="99", "Chromium";v="90", "Google Chrome";v="90""#,
        ),
    );
    headers.insert(
        HeaderName::from_static("sec-ch-ua-mobile"),
        HeaderValue::from_static("?0"),
    );
    headers.insert(DNT, HeaderValue::from_static("1"));
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("cors"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("empty"),
    );
    headers.insert(
        ORIGIN,
        HeaderValue::from_str(&entry.origin().ascii_serialization())
            .map_err(|e| invalid("Origin", e))?,
    );
    headers.insert(
        REFERER,
        HeaderValue::from_str(entry.as_str()).map_err(|e| invalid("Referer", e))?,
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_str(accept_language).map_err(|e| invalid("Accept-Language", e))?,
    );
    Ok(headers)
}
