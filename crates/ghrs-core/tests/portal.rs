//! End-to-end tests against a mocked portal and SSO host.
//!
//! Two mockito servers give two distinct origins, so the tests can check
//! that Basic credentials only ever reach the SSO host.

use chrono::NaiveDate;
use ghrs_core::config::PortalConfig;
use ghrs_core::credentials::Credentials;
use ghrs_core::error::{GhrsError, QueryPhase};
use ghrs_core::query::{QueryWindow, MAX_FORM_REDIRECTS};
use ghrs_core::session::{Authenticator, MAX_AUTH_HOPS};
use ghrs_core::GhrsClient;
use mockito::{Matcher, Server, ServerGuard};

/// `Basic base64("alice:s3cret")`
const BASIC_ALICE: &str = "Basic YWxpY2U6czNjcmV0";

const LANDING_HTML: &str = r#"<html><body>
<form name="win0" method="post" action="/psc/query">
  <input type="hidden" name="ICType" value="Query">
  <input type="hidden" name="ICStateNum" value="1">
  <input type="hidden" name="ICAction" value="None">
  <input type="text" name="InputKeys_bind1" value="">
  <input type="text" name="InputKeys_bind2" value="">
  <input type="text" name="InputKeys_ACCT_CD" value="">
  <input type="text" name="InputKeys_COMPANY" value="">
</form></body></html>"#;

const RESULTS_HTML: &str = r#"<html><body>
<form name="win0" method="post" action="/psc/results">
  <input type="hidden" name="ICStateNum" value="2">
  <input type="hidden" name="ICAction" value="None">
  <input type="hidden" name="InputKeys_bind1" value="2021/06/07">
</form></body></html>"#;

const EXPORT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<query numrows="2" queryname="SA_REPORT_TS_XSIGHT_ITA">
  <row rownumber="1">
    <EMPLID>00123456</EMPLID><EMPL_RCD>0</EMPL_RCD>
    <FIRST_NAME>Mario</FIRST_NAME><LAST_NAME>Rossi</LAST_NAME>
    <TL_QUANTITY>4.0</TL_QUANTITY><DUR>2021-06-07</DUR>
    <ACCT_CD>F94170</ACCT_CD><COMPANY>102</COMPANY>
    <USER_FIELD_2>J-001</USER_FIELD_2><USER_FIELD_3/><USER_FIELD_5/>
  </row>
  <row rownumber="2">
    <EMPLID>00123456</EMPLID><EMPL_RCD>0</EMPL_RCD>
    <FIRST_NAME>Mario</FIRST_NAME><LAST_NAME>Rossi</LAST_NAME>
    <TL_QUANTITY>3.5</TL_QUANTITY><DUR>2021-06-08</DUR>
    <ACCT_CD>F94170</ACCT_CD><COMPANY>102</COMPANY>
    <USER_FIELD_2>J-001</USER_FIELD_2><USER_FIELD_3/><USER_FIELD_5/>
  </row>
</query>"#;

fn credentials() -> Credentials {
    Credentials::new("alice", "s3cret")
}

fn portal_config(portal: &ServerGuard, sso: &ServerGuard) -> PortalConfig {
    PortalConfig {
        entry_url: format!("{}/entry", portal.url()),
        auth_url: sso.url(),
        timeout_secs: 10,
        ..PortalConfig::default()
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// entry -> sso -> entry, ending on `landing`.
fn mock_sso_chain(
    portal: &mut ServerGuard,
    sso: &mut ServerGuard,
    landing: &str,
) -> Vec<mockito::Mock> {
    let first = portal
        .mock("GET", "/entry")
        .match_header("cookie", Matcher::Missing)
        .match_header("authorization", Matcher::Missing)
        .with_status(302)
        .with_header("location", &format!("{}/login", sso.url()))
        .with_header("set-cookie", "PS_LOGIN=pending; Path=/")
        .expect(1)
        .create();
    let login = sso
        .mock("GET", "/login")
        .match_header("authorization", BASIC_ALICE)
        .with_status(302)
        .with_header("location", &format!("{}/entry", portal.url()))
        .expect(1)
        .create();
    let back = portal
        .mock("GET", "/entry")
        .match_header("cookie", Matcher::Regex("PS_LOGIN=pending".to_string()))
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(landing)
        .expect(1)
        .create();
    vec![first, login, back]
}

#[test]
fn test_sso_chain_authenticates() {
    let mut portal = Server::new();
    let mut sso = Server::new();
    let mocks = mock_sso_chain(&mut portal, &mut sso, LANDING_HTML);

    let auth = Authenticator::new(&portal_config(&portal, &sso)).unwrap();
    let session = auth.authenticate(&credentials()).unwrap();

    for m in &mocks {
        m.assert();
    }
    assert_eq!(session.hops(), 2);
    assert_eq!(session.landing().status, 200);
    assert!(session.landing().body.contains("win0"));
    let basic: Vec<bool> = session.attempts().iter().map(|a| a.basic_auth).collect();
    assert_eq!(basic, vec![false, true, false]);
    assert_eq!(
        session.attempts()[0].location.as_ref().map(|u| u.as_str()),
        Some(format!("{}/login", sso.url()).as_str())
    );
}

#[test]
fn test_relative_redirect_on_portal_gets_no_credentials() {
    let mut portal = Server::new();
    let sso = Server::new();
    let entry = portal
        .mock("GET", "/entry")
        .with_status(302)
        .with_header("location", "/psc/landing")
        .create();
    let landing = portal
        .mock("GET", "/psc/landing")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(LANDING_HTML)
        .expect(1)
        .create();

    let auth = Authenticator::new(&portal_config(&portal, &sso)).unwrap();
    let session = auth.authenticate(&credentials()).unwrap();

    entry.assert();
    landing.assert();
    assert_eq!(session.hops(), 1);
    assert!(session.landing().url.as_str().ends_with("/psc/landing"));
}

#[test]
fn test_redirect_loop_exhausts_budget() {
    let mut portal = Server::new();
    let sso = Server::new();
    let looping = portal
        .mock("GET", "/entry")
        .with_status(302)
        .with_header("location", "/entry")
        .expect(MAX_AUTH_HOPS + 1)
        .create();

    let auth = Authenticator::new(&portal_config(&portal, &sso)).unwrap();
    let err = auth.authenticate(&credentials()).unwrap_err();

    looping.assert();
    match err {
        GhrsError::Auth { status, hops } => {
            assert_eq!(status, 302);
            assert_eq!(hops, MAX_AUTH_HOPS);
        }
        other => panic!("expected Auth error, got {other:?}"),
    }
}

#[test]
fn test_rejected_credentials_fail_with_last_status() {
    let mut portal = Server::new();
    let mut sso = Server::new();
    let _entry = portal
        .mock("GET", "/entry")
        .with_status(302)
        .with_header("location", &format!("{}/login", sso.url()))
        .create();
    let _login = sso
        .mock("GET", "/login")
        .with_status(401)
        .with_body("Unauthorized")
        .create();

    let auth = Authenticator::new(&portal_config(&portal, &sso)).unwrap();
    let err = auth.authenticate(&credentials()).unwrap_err();
    assert!(matches!(err, GhrsError::Auth { status: 401, hops: 1 }));
}

#[test]
fn test_redirect_without_location_fails() {
    let mut portal = Server::new();
    let sso = Server::new();
    let _entry = portal.mock("GET", "/entry").with_status(302).create();

    let auth = Authenticator::new(&portal_config(&portal, &sso)).unwrap();
    let err = auth.authenticate(&credentials()).unwrap_err();
    assert!(matches!(err, GhrsError::Auth { status: 302, hops: 0 }));
}

#[test]
fn test_query_end_to_end_weekly_summary() {
    let mut portal = Server::new();
    let mut sso = Server::new();
    let config = portal_config(&portal, &sso);
    let _sso = mock_sso_chain(&mut portal, &mut sso, LANDING_HTML);

    let render = portal
        .mock("POST", "/psc/query")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_header("referer", config.entry_url.as_str())
        .match_header("accept-language", "en")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("ICAction".into(), "#ICOK".into()),
            Matcher::UrlEncoded("ICStateNum".into(), "1".into()),
            Matcher::UrlEncoded("ICType".into(), "Query".into()),
            Matcher::UrlEncoded("InputKeys_bind1".into(), "2021/06/07".into()),
            Matcher::UrlEncoded("InputKeys_bind2".into(), "2021/06/13".into()),
            Matcher::UrlEncoded("InputKeys_ACCT_CD".into(), "F94170".into()),
            Matcher::UrlEncoded("InputKeys_COMPANY".into(), "102".into()),
        ]))
        .with_status(200)
        .with_body(RESULTS_HTML)
        .expect(1)
        .create();
    let download = portal
        .mock("POST", "/psc/results")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("ICAction".into(), "#ICQryDownloadXML".into()),
            Matcher::UrlEncoded("ICStateNum".into(), "2".into()),
            Matcher::UrlEncoded("InputKeys_bind1".into(), "2021/06/07".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "text/xml")
        .with_body(EXPORT_XML)
        .expect(1)
        .create();

    let client = GhrsClient::connect(&config, credentials()).unwrap();
    let records = client
        .get_data(date(2021, 6, 7), date(2021, 6, 13), "F94170", "102")
        .unwrap();

    render.assert();
    download.assert();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].work_date, date(2021, 6, 7));
    assert_eq!(records[1].hours, 3.5);
    assert_eq!(records[0].user_field_3, "");

    let weekly = client.summarize_by_week(&records);
    assert_eq!(weekly.len(), 1);
    assert_eq!(weekly[0].week_start, date(2021, 6, 7));
    assert_eq!(weekly[0].hours, 7.5);
    assert_eq!(weekly[0].key.user_field_2, "J-001");
}

#[test]
fn test_query_empty_export_is_ok() {
    let mut portal = Server::new();
    let mut sso = Server::new();
    let config = portal_config(&portal, &sso);
    let _sso = mock_sso_chain(&mut portal, &mut sso, LANDING_HTML);
    let _render = portal
        .mock("POST", "/psc/query")
        .with_status(200)
        .with_body(RESULTS_HTML)
        .create();
    let _download = portal
        .mock("POST", "/psc/results")
        .with_status(200)
        .with_body(r#"<?xml version="1.0"?><query numrows="0"></query>"#)
        .create();

    let client = GhrsClient::connect(&config, credentials()).unwrap();
    let records = client
        .get_data(date(2021, 6, 7), date(2021, 6, 13), "F94170", "102")
        .unwrap();
    assert!(records.is_empty());
    assert!(client.summarize_by_week(&records).is_empty());
}

#[test]
fn test_landing_without_form_posts_nothing() {
    let mut portal = Server::new();
    let mut sso = Server::new();
    let config = portal_config(&portal, &sso);
    let _sso = mock_sso_chain(
        &mut portal,
        &mut sso,
        "<html><body>Session expired</body></html>",
    );
    let render = portal.mock("POST", Matcher::Any).expect(0).create();

    let client = GhrsClient::connect(&config, credentials()).unwrap();
    let err = client
        .get_data(date(2021, 6, 7), date(2021, 6, 13), "F94170", "102")
        .unwrap_err();

    render.assert();
    assert!(matches!(
        err,
        GhrsError::NoForm {
            phase: QueryPhase::Render
        }
    ));
    assert!(err.is_stale_session());
}

#[test]
fn test_render_http_error() {
    let mut portal = Server::new();
    let mut sso = Server::new();
    let config = portal_config(&portal, &sso);
    let _sso = mock_sso_chain(&mut portal, &mut sso, LANDING_HTML);
    let _render = portal.mock("POST", "/psc/query").with_status(500).create();

    let client = GhrsClient::connect(&config, credentials()).unwrap();
    let err = client
        .get_data(date(2021, 6, 7), date(2021, 6, 13), "F94170", "102")
        .unwrap_err();
    assert!(matches!(
        err,
        GhrsError::QueryHttp {
            phase: QueryPhase::Render,
            status: 500
        }
    ));
}

#[test]
fn test_results_without_form() {
    let mut portal = Server::new();
    let mut sso = Server::new();
    let config = portal_config(&portal, &sso);
    let _sso = mock_sso_chain(&mut portal, &mut sso, LANDING_HTML);
    let _render = portal
        .mock("POST", "/psc/query")
        .with_status(200)
        .with_body("<html><body>No matching values were found.</body></html>")
        .create();

    let client = GhrsClient::connect(&config, credentials()).unwrap();
    let err = client
        .get_data(date(2021, 6, 7), date(2021, 6, 13), "F94170", "102")
        .unwrap_err();
    assert!(matches!(
        err,
        GhrsError::NoForm {
            phase: QueryPhase::Export
        }
    ));
}

#[test]
fn test_export_http_error() {
    let mut portal = Server::new();
    let mut sso = Server::new();
    let config = portal_config(&portal, &sso);
    let _sso = mock_sso_chain(&mut portal, &mut sso, LANDING_HTML);
    let _render = portal
        .mock("POST", "/psc/query")
        .with_status(200)
        .with_body(RESULTS_HTML)
        .create();
    let _download = portal.mock("POST", "/psc/results").with_status(403).create();

    let client = GhrsClient::connect(&config, credentials()).unwrap();
    let err = client
        .get_data(date(2021, 6, 7), date(2021, 6, 13), "F94170", "102")
        .unwrap_err();
    assert!(matches!(
        err,
        GhrsError::QueryHttp {
            phase: QueryPhase::Export,
            status: 403
        }
    ));
}

#[test]
fn test_malformed_export_date_surfaces() {
    let mut portal = Server::new();
    let mut sso = Server::new();
    let config = portal_config(&portal, &sso);
    let _sso = mock_sso_chain(&mut portal, &mut sso, LANDING_HTML);
    let _render = portal
        .mock("POST", "/psc/query")
        .with_status(200)
        .with_body(RESULTS_HTML)
        .create();
    let _download = portal
        .mock("POST", "/psc/results")
        .with_status(200)
        .with_body(EXPORT_XML.replace("2021-06-08", "08/06/2021"))
        .create();

    let client = GhrsClient::connect(&config, credentials()).unwrap();
    let err = client
        .get_data(date(2021, 6, 7), date(2021, 6, 13), "F94170", "102")
        .unwrap_err();
    assert!(matches!(err, GhrsError::MalformedDate { row: 1, .. }));
}

#[test]
fn test_reauthenticate_replaces_session() {
    let mut portal = Server::new();
    let sso = Server::new();
    let config = portal_config(&portal, &sso);
    let entry = portal
        .mock("GET", "/entry")
        .with_status(200)
        .with_body(LANDING_HTML)
        .expect(2)
        .create();

    let mut client = GhrsClient::connect(&config, credentials()).unwrap();
    assert_eq!(client.session().hops(), 0);
    client.reauthenticate().unwrap();

    entry.assert();
}

#[test]
fn test_connect_reports_auth_failure() {
    let mut portal = Server::new();
    let sso = Server::new();
    let _entry = portal.mock("GET", "/entry").with_status(503).create();

    let err = GhrsClient::connect(&portal_config(&portal, &sso), credentials()).unwrap_err();
    assert!(matches!(err, GhrsError::Auth { status: 503, hops: 0 }));
}

/// Address of a listener that accepts connections and never answers.
fn silent_listener() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        // Keep every stream open so the client waits instead of seeing a reset.
        let mut held = Vec::new();
        for stream in listener.incoming() {
            held.push(stream);
        }
    });
    format!("http://{addr}")
}

#[test]
fn test_auth_timeout_is_transport_error() {
    let sso = Server::new();
    let config = PortalConfig {
        entry_url: format!("{}/entry", silent_listener()),
        auth_url: sso.url(),
        timeout_secs: 1,
        ..PortalConfig::default()
    };

    let err = Authenticator::new(&config)
        .unwrap()
        .authenticate(&credentials())
        .unwrap_err();

    assert!(matches!(err, GhrsError::AuthTransport(_)), "{err:?}");
    assert!(err.is_timeout());
    assert!(!err.is_stale_session());
}

#[test]
fn test_query_timeout_is_transport_error() {
    let mut portal = Server::new();
    let mut sso = Server::new();
    let landing = LANDING_HTML.replace(
        r#"action="/psc/query""#,
        &format!(r#"action="{}/psc/query""#, silent_listener()),
    );
    let _chain = mock_sso_chain(&mut portal, &mut sso, &landing);
    let config = PortalConfig {
        timeout_secs: 1,
        ..portal_config(&portal, &sso)
    };

    let client = GhrsClient::connect(&config, credentials()).unwrap();
    let err = client
        .get_data(date(2021, 6, 7), date(2021, 6, 13), "F94170", "102")
        .unwrap_err();

    assert!(
        matches!(
            err,
            GhrsError::QueryTransport {
                phase: QueryPhase::Render,
                ..
            }
        ),
        "{err:?}"
    );
    assert!(err.is_timeout());
}

#[test]
fn test_query_follows_redirect_after_post() {
    let mut portal = Server::new();
    let mut sso = Server::new();
    let config = portal_config(&portal, &sso);
    let _chain = mock_sso_chain(&mut portal, &mut sso, LANDING_HTML);

    let render = portal
        .mock("POST", "/psc/query")
        .with_status(302)
        .with_header("location", "/psc/query-results")
        .expect(1)
        .create();
    let results = portal
        .mock("GET", "/psc/query-results")
        .match_header("cookie", Matcher::Regex("PS_LOGIN=pending".to_string()))
        .with_status(200)
        .with_body(RESULTS_HTML)
        .expect(1)
        .create();
    let download = portal
        .mock("POST", "/psc/results")
        .match_body(Matcher::UrlEncoded(
            "ICAction".into(),
            "#ICQryDownloadXML".into(),
        ))
        .with_status(200)
        .with_body(EXPORT_XML)
        .expect(1)
        .create();

    let client = GhrsClient::connect(&config, credentials()).unwrap();
    let records = client
        .get_data(date(2021, 6, 7), date(2021, 6, 13), "F94170", "102")
        .unwrap();

    render.assert();
    results.assert();
    download.assert();
    assert_eq!(records.len(), 2);
}

#[test]
fn test_query_redirect_loop_is_bounded() {
    let mut portal = Server::new();
    let mut sso = Server::new();
    let config = portal_config(&portal, &sso);
    let _chain = mock_sso_chain(&mut portal, &mut sso, LANDING_HTML);

    let _render = portal
        .mock("POST", "/psc/query")
        .with_status(302)
        .with_header("location", "/psc/again")
        .create();
    let again = portal
        .mock("GET", "/psc/again")
        .with_status(302)
        .with_header("location", "/psc/again")
        .expect(MAX_FORM_REDIRECTS)
        .create();

    let client = GhrsClient::connect(&config, credentials()).unwrap();
    let err = client
        .get_data(date(2021, 6, 7), date(2021, 6, 13), "F94170", "102")
        .unwrap_err();

    again.assert();
    assert!(
        matches!(
            err,
            GhrsError::QueryHttp {
                phase: QueryPhase::Render,
                status: 302
            }
        ),
        "{err:?}"
    );
}

#[test]
fn test_query_with_hands_over_raw_export() {
    let mut portal = Server::new();
    let mut sso = Server::new();
    let config = portal_config(&portal, &sso);
    let _chain = mock_sso_chain(&mut portal, &mut sso, LANDING_HTML);
    let _render = portal
        .mock("POST", "/psc/query")
        .with_status(200)
        .with_body(RESULTS_HTML)
        .expect(2)
        .create();
    let _download = portal
        .mock("POST", "/psc/results")
        .with_status(200)
        .with_body(EXPORT_XML)
        .expect(2)
        .create();

    let client = GhrsClient::connect(&config, credentials()).unwrap();
    let window = QueryWindow::new(date(2021, 6, 7), date(2021, 6, 13), "F94170", "102").unwrap();

    let mut raw = String::new();
    let records = client
        .query_with(&window, |xml| {
            raw = xml.to_string();
            Ok(())
        })
        .unwrap();
    assert_eq!(raw, EXPORT_XML);
    assert_eq!(records.len(), 2);

    // A failing hook stops the query before parsing.
    let err = client
        .query_with(&window, |_| {
            Err(GhrsError::Io(std::io::Error::other("disk full")))
        })
        .unwrap_err();
    assert!(matches!(err, GhrsError::Io(_)));
}
