//! Scripted in-memory transport shared by the session tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use reddot::{
    Guid, PasswordAuthentication, RqlError, ServerLogin, ServerVersion, Session, Transport,
};

pub const LOGIN_GUID: &str = "11111111111111111111111111111111";
pub const USER_GUID: &str = "22222222222222222222222222222222";
pub const PROJECT_GUID: &str = "33333333333333333333333333333333";
pub const OTHER_PROJECT_GUID: &str = "44444444444444444444444444444444";

pub fn guid(text: &str) -> Guid {
    Guid::parse(text).unwrap()
}

#[derive(Default)]
struct Script {
    queue: VecDeque<Result<String, RqlError>>,
    routes: Vec<(String, String)>,
    sent: Vec<String>,
}

/// Replies from a queue first, then from substring routes.
///
/// Clones share the script, so a test keeps one clone to inspect what the
/// session sent after handing the other to the session.
#[derive(Clone)]
pub struct MockTransport {
    version: ServerVersion,
    script: Arc<Mutex<Script>>,
}

impl MockTransport {
    pub fn new(version: ServerVersion) -> Self {
        Self {
            version,
            script: Arc::default(),
        }
    }

    pub fn v11() -> Self {
        Self::new(ServerVersion::new(11, 2, 2, 127))
    }

    /// Reply to the next request with `reply`
    pub fn push(&self, reply: &str) -> &Self {
        self.push_result(Ok(reply.to_string()))
    }

    pub fn push_result(&self, reply: Result<String, RqlError>) -> &Self {
        self.script.lock().unwrap().queue.push_back(reply);
        self
    }

    /// Reply with `reply` to every request containing `pattern` once the queue is empty
    pub fn route(&self, pattern: &str, reply: &str) -> &Self {
        self.script
            .lock()
            .unwrap()
            .routes
            .push((pattern.to_string(), reply.to_string()));
        self
    }

    pub fn sent(&self) -> Vec<String> {
        self.script.lock().unwrap().sent.clone()
    }

    /// Number of payloads sent that contain `pattern`
    pub fn count(&self, pattern: &str) -> usize {
        self.sent().iter().filter(|p| p.contains(pattern)).count()
    }

    pub fn clear_sent(&self) {
        self.script.lock().unwrap().sent.clear();
    }
}

impl Transport for MockTransport {
    fn server_name(&self) -> &str {
        "mock"
    }

    fn server_version(&self) -> reddot_rql::Result<ServerVersion> {
        Ok(self.version)
    }

    fn send(&self, payload: &str) -> reddot_rql::Result<String> {
        let mut script = self.script.lock().unwrap();
        script.sent.push(payload.to_string());
        if let Some(reply) = script.queue.pop_front() {
            return reply;
        }
        script
            .routes
            .iter()
            .find(|(pattern, _)| payload.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone())
            .ok_or_else(|| RqlError::Soap(format!("no scripted reply for {payload}")))
    }
}

pub fn server_login() -> ServerLogin {
    ServerLogin::new(
        "cms",
        "http://cms.example.com/cms/",
        PasswordAuthentication::new("admin", "s<&>cret"),
    )
}

pub fn login_reply() -> String {
    format!(r#"<IODATA><LOGIN guid="{LOGIN_GUID}" userguid="{USER_GUID}"/></IODATA>"#)
}

pub fn select_reply(key: &str) -> String {
    format!(r#"<IODATA><SERVER guid="00000000000000000000000000000001" key="{key}"/></IODATA>"#)
}

/// A session logged in through `mock`, no project selected.
pub fn logged_in(mock: &MockTransport) -> Session {
    mock.push(&login_reply());
    let session = Session::login_with_transport(server_login(), Box::new(mock.clone())).unwrap();
    mock.clear_sent();
    session
}

/// A session logged in through `mock` with [`PROJECT_GUID`] selected.
pub fn logged_in_with_project(mock: &MockTransport) -> Session {
    mock.route(r#"action="validate""#, &select_reply("KEY1"));
    let session = logged_in(mock);
    session.select_project(guid(PROJECT_GUID)).unwrap();
    mock.clear_sent();
    session
}
