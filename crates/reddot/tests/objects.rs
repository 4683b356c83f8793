//! Lazy loading, cached collections and content class writes against a
//! scripted transport.

mod common;

use std::time::Duration;

use common::*;
use pretty_assertions::assert_eq;
use reddot::{Error, LanguageDependent, ModuleType, PartialObject};

const USERS_LIST: &str = r#"<IODATA><USERS>
    <USER guid="66666666666666666666666666666666" name="admin" fullname="Administrator" email="admin@example.com"/>
    <USER guid="77777777777777777777777777777777" name="editor" fullname="Editor" email=""/>
</USERS></IODATA>"#;

const ADMIN_LOAD: &str = r#"<IODATA><USER guid="66666666666666666666666666666666" name="admin" fullname="Administrator" email="admin@example.com" description="Built-in" lcid="1033" userlanguage="ENG"/></IODATA>"#;

#[test]
fn test_stub_loads_once_on_first_missing_value() {
    let mock = MockTransport::v11();
    let session = logged_in(&mock);
    mock.route("<USERS", USERS_LIST)
        .route(r#"<USER action="load""#, ADMIN_LOAD);

    let admin = session.users().get_by_key(&"admin".to_string()).unwrap();
    assert!(!admin.is_initialized());
    assert_eq!(admin.full_name().unwrap(), "Administrator");
    assert_eq!(mock.count(r#"action="load""#), 0);

    assert_eq!(admin.description().unwrap(), "Built-in");
    assert_eq!(admin.lcid().unwrap(), Some(1033));
    assert_eq!(admin.user_language().unwrap(), "ENG");
    assert!(admin.is_initialized());
    assert_eq!(mock.count(r#"action="load""#), 1);

    // the snapshot hands out handles sharing the loaded state
    let again = session.users().get_by_key(&"admin".to_string()).unwrap();
    assert!(again.is_initialized());
    assert_eq!(mock.count("<USERS"), 1);
}

#[test]
fn test_refresh_twice_yields_same_values() {
    let mock = MockTransport::v11();
    let session = logged_in(&mock);
    mock.route("<USERS", USERS_LIST)
        .route(r#"<USER action="load""#, ADMIN_LOAD);

    let admin = session.users().get_by_key(&"admin".to_string()).unwrap();
    admin.refresh().unwrap();
    let first = (admin.description().unwrap(), admin.lcid().unwrap());
    admin.refresh().unwrap();
    let second = (admin.description().unwrap(), admin.lcid().unwrap());

    assert_eq!(first, second);
    assert_eq!(mock.count(r#"action="load""#), 2);
}

#[test]
fn test_get_user_reports_missing_user() {
    let mock = MockTransport::v11();
    let session = logged_in(&mock);
    mock.push("<IODATA></IODATA>");

    let err = session.get_user(guid(PROJECT_GUID)).unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
}

#[test]
fn test_invalidate_refetches_once() {
    let mock = MockTransport::v11();
    let session = logged_in(&mock);
    mock.route(
        "<GROUPS",
        r#"<IODATA><GROUPS><GROUP guid="88888888888888888888888888888888" name="Editors" email="editors@example.com"/></GROUPS></IODATA>"#,
    );

    assert_eq!(session.groups().get().unwrap().len(), 1);
    assert_eq!(session.groups().get().unwrap().len(), 1);
    assert_eq!(mock.count("<GROUPS"), 1);

    session.groups().invalidate_cache();
    let editors = session.groups().get_by_key(&"Editors".to_string()).unwrap();
    session.groups().get().unwrap();
    assert_eq!(mock.count("<GROUPS"), 2);
    assert_eq!(editors.email().unwrap(), "editors@example.com");
}

#[test]
fn test_create_group_invalidates_group_list() {
    let mock = MockTransport::v11();
    let session = logged_in(&mock);
    mock.push("<IODATA><GROUPS/></IODATA>");
    assert!(session.groups().get().unwrap().is_empty());

    mock.push("<IODATA>88888888888888888888888888888888</IODATA>").push(
        r#"<IODATA><GROUPS><GROUP guid="88888888888888888888888888888888" name="R&amp;D" email="rd@example.com"/></GROUPS></IODATA>"#,
    );
    let group = session.create_group("R&D", "rd@example.com").unwrap();

    assert_eq!(group.name().unwrap(), "R&D");
    assert!(mock.sent()[1].contains(r#"<GROUP action="addnew" name="R&amp;D" email="rd@example.com"/>"#));
}

#[test]
fn test_modules_are_indexed_by_type() {
    let mock = MockTransport::v11();
    let session = logged_in(&mock);
    mock.route(
        "<MODULES",
        r#"<IODATA><MODULES>
            <MODULE guid="A0000000000000000000000000000001" id="cms" name="CMS"/>
            <MODULE guid="A0000000000000000000000000000002" id="servermanager" name="Server Manager"/>
            <MODULE guid="A0000000000000000000000000000003" id="homepage" name="Homepage"/>
        </MODULES></IODATA>"#,
    );

    let modules = session.modules();
    assert_eq!(modules.get_by_key(&ModuleType::ServerManager).unwrap().name, "Server Manager");
    assert!(modules
        .contains_key(&ModuleType::Other("homepage".into()))
        .unwrap());
    assert!(!modules.contains_key(&ModuleType::Asset).unwrap());
}

#[test]
fn test_standard_locale() {
    let mock = MockTransport::v11();
    let session = logged_in(&mock);
    mock.route(
        r#"<LANGUAGE action="list""#,
        r#"<IODATA><LANGUAGES>
            <LIST id="1031" country="Germany" language="DEU" name="German" isstandardlanguage="0"/>
            <LIST id="1033" country="United States" language="ENU" name="English" isstandardlanguage="1"/>
        </LANGUAGES></IODATA>"#,
    );

    assert_eq!(session.standard_locale().unwrap().lcid, 1033);
    assert_eq!(session.locales().get_by_key(&1031).unwrap().abbreviation, "DEU");
}

#[test]
fn test_application_servers_are_stubs_with_name_and_ip() {
    let mock = MockTransport::v11();
    let session = logged_in(&mock);
    mock.route(
        "<EDITORIALSERVERS",
        r#"<IODATA><EDITORIALSERVERS><EDITORIALSERVER guid="B0000000000000000000000000000001" name="cms01" ip="10.0.0.1"/></EDITORIALSERVERS></IODATA>"#,
    )
    .route(
        r#"<EDITORIALSERVER action="load""#,
        r#"<IODATA><EDITORIALSERVER guid="B0000000000000000000000000000001" name="cms01" ip="10.0.0.1" adress="cms@example.com"/></IODATA>"#,
    );

    let servers = session.application_servers().get().unwrap();
    let server = &servers[0];
    assert_eq!(server.name().unwrap(), "cms01");
    assert_eq!(server.ip_address().unwrap(), "10.0.0.1");
    assert_eq!(mock.count(r#"action="load""#), 0);

    assert_eq!(server.from_address().unwrap(), "cms@example.com");
    assert_eq!(mock.count(r#"action="load""#), 1);
}

#[test]
fn test_wait_for_async_process_returns_once_process_is_gone() {
    let mock = MockTransport::v11();
    let session = logged_in(&mock);
    mock.push(
        r#"<IODATA><ASYNCQUEUE guid="C0000000000000000000000000000001" name="Publish Intranet" status="1"/></IODATA>"#,
    )
    .push("<IODATA/>");

    session
        .wait_for_async_process_with_retry(
            Duration::from_secs(5),
            Duration::from_millis(10),
            |process| process.name.contains("Publish"),
        )
        .unwrap();
    assert_eq!(mock.count("<ASYNCQUEUE"), 2);
}

#[test]
fn test_wait_for_async_process_times_out() {
    let mock = MockTransport::v11();
    let session = logged_in(&mock);
    mock.route("<ASYNCQUEUE", "<IODATA/>");

    let err = session
        .wait_for_async_process_with_retry(
            Duration::from_millis(200),
            Duration::from_millis(10),
            |process| process.name.contains("Publish"),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(_)), "{err:?}");
    assert!(mock.count("<ASYNCQUEUE") >= 2);
}

fn content_class_routes(mock: &MockTransport) {
    mock.route(
        r#"<TEMPLATES action="list""#,
        r#"<IODATA><TEMPLATES><TEMPLATE guid="D0000000000000000000000000000001" name="Article" folderguid="E0000000000000000000000000000001"/></TEMPLATES></IODATA>"#,
    )
    .route(
        r#"<LANGUAGEVARIANTS action="list""#,
        r#"<IODATA><LANGUAGEVARIANTS>
            <LANGUAGEVARIANT guid="F0000000000000000000000000000001" name="Deutsch" language="DEU" ismainlanguage="1" checked="1"/>
            <LANGUAGEVARIANT guid="F0000000000000000000000000000002" name="English" language="ENG" ismainlanguage="0" checked="0"/>
        </LANGUAGEVARIANTS></IODATA>"#,
    )
    .route(r#"action="setactive""#, "<IODATA/>")
    .route(r#"action="save""#, "<IODATA/>")
    .route(
        r#"<TEMPLATE action="load""#,
        r#"<IODATA><TEMPLATE guid="D0000000000000000000000000000001" name="Article" description="Artikel" folderguid="E0000000000000000000000000000001"/></IODATA>"#,
    );
}

#[test]
fn test_language_fragment_is_retrieved_once_and_variant_restored() {
    let mock = MockTransport::v11();
    let session = logged_in_with_project(&mock);
    content_class_routes(&mock);

    let project = reddot::Project::new(session.session_ref(), guid(PROJECT_GUID));
    let article = project
        .content_classes()
        .get_by_key(&"Article".to_string())
        .unwrap();

    assert_eq!(article.description_in("ENG").unwrap(), "Artikel");
    assert_eq!(article.description_in("ENG").unwrap(), "Artikel");
    assert!(article.language_fragments().contains("ENG"));

    let sent = mock.sent();
    let activations: Vec<&String> = sent.iter().filter(|p| p.contains("setactive")).collect();
    assert_eq!(activations.len(), 2);
    assert!(activations[0].contains("F0000000000000000000000000000002"));
    assert!(activations[1].contains("F0000000000000000000000000000001"));
    assert_eq!(mock.count(r#"<TEMPLATE action="load""#), 1);
}

#[test]
fn test_refresh_drops_language_fragments() {
    let mock = MockTransport::v11();
    let session = logged_in_with_project(&mock);
    content_class_routes(&mock);

    let project = reddot::Project::new(session.session_ref(), guid(PROJECT_GUID));
    let article = project
        .content_classes()
        .get_by_key(&"Article".to_string())
        .unwrap();

    article.description_in("ENG").unwrap();
    assert!(article.language_fragments().contains("ENG"));
    assert_eq!(mock.count(r#"<TEMPLATE action="load""#), 1);

    article.refresh().unwrap();
    assert!(!article.language_fragments().contains("ENG"));
    assert_eq!(mock.count(r#"<TEMPLATE action="load""#), 2);
    assert_eq!(mock.count("setactive"), 2);

    assert_eq!(article.description_in("ENG").unwrap(), "Artikel");
    assert!(article.language_fragments().contains("ENG"));
    assert_eq!(mock.count(r#"<TEMPLATE action="load""#), 3);
    assert_eq!(mock.count("setactive"), 4);
}

#[test]
fn test_language_context_of_active_variant_does_not_switch() {
    let mock = MockTransport::v11();
    let session = logged_in_with_project(&mock);
    content_class_routes(&mock);

    let project = reddot::Project::new(session.session_ref(), guid(PROJECT_GUID));
    let article = project
        .content_classes()
        .get_by_key(&"Article".to_string())
        .unwrap();

    article.description_in("DEU").unwrap();
    assert_eq!(mock.count("setactive"), 0);

    let err = article.description_in("FRA").unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
}

#[test]
fn test_content_class_commit_flushes_pending_writes() {
    let mock = MockTransport::v11();
    let session = logged_in_with_project(&mock);
    content_class_routes(&mock);

    let project = reddot::Project::new(session.session_ref(), guid(PROJECT_GUID));
    let article = project
        .content_classes()
        .get_by_key(&"Article".to_string())
        .unwrap();

    article.set_description("News & more").unwrap();
    assert_eq!(article.description().unwrap(), "News & more");
    assert_eq!(mock.count(r#"action="save""#), 0);

    article.commit().unwrap();
    article.commit().unwrap();

    assert_eq!(mock.count(r#"action="save""#), 1);
    assert!(mock.sent().iter().any(|p| p.contains(
        r#"<TEMPLATE action="save" guid="D0000000000000000000000000000001" description="News &amp; more"/>"#
    )));
    assert!(reddot_core::Materialize::core(&article)
        .pending_writes()
        .is_empty());
}

#[test]
fn test_folder_of_content_class_loads_lazily() {
    let mock = MockTransport::v11();
    let session = logged_in_with_project(&mock);
    content_class_routes(&mock);
    mock.route(
        r#"<FOLDER action="load""#,
        r#"<IODATA><FOLDER guid="E0000000000000000000000000000001" name="Images" catalog="1"/></IODATA>"#,
    );

    let project = reddot::Project::new(session.session_ref(), guid(PROJECT_GUID));
    let article = project
        .content_classes()
        .get_by_key(&"Article".to_string())
        .unwrap();
    let folder = article.folder().unwrap().unwrap();

    assert_eq!(folder.guid(), guid("E0000000000000000000000000000001"));
    assert_eq!(mock.count(r#"<FOLDER action="load""#), 0);
    assert!(folder.is_asset_manager_folder().unwrap());
    assert_eq!(folder.name().unwrap(), "Images");
    assert_eq!(mock.count(r#"<FOLDER action="load""#), 1);
}

#[test]
fn test_objects_fail_after_session_is_dropped() {
    let mock = MockTransport::v11();
    let session = logged_in(&mock);
    let user = reddot::User::new(session.session_ref(), guid(USER_GUID));
    drop(session);

    let err = user.full_name().unwrap_err();
    assert!(matches!(err, Error::Internal(_)), "{err:?}");
}
