//! HttpTransport against a loopback HTTP server.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread;

use pretty_assertions::assert_eq;
use reddot_core::ServerVersion;
use reddot_rql::{HttpTransport, RqlError, Transport, TransportConfig};

struct Recorded {
    request_line: String,
    soap_action: Option<String>,
    body: String,
}

/// Serve one canned response per entry of `responses`, then stop.
fn serve(responses: Vec<(u16, String)>) -> (String, thread::JoinHandle<Vec<Recorded>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let mut recorded = Vec::new();
        for (status, body) in responses {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();

            let mut content_length = 0usize;
            let mut soap_action = None;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                let (name, value) = line.split_once(':').unwrap();
                match name.to_ascii_lowercase().as_str() {
                    "content-length" => content_length = value.trim().parse().unwrap(),
                    "soapaction" => soap_action = Some(value.trim().to_string()),
                    _ => {}
                }
            }

            let mut request_body = vec![0u8; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {status} OK\r\nContent-Type: text/xml; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            stream.flush().unwrap();

            recorded.push(Recorded {
                request_line: request_line.trim_end().to_string(),
                soap_action,
                body: String::from_utf8(request_body).unwrap(),
            });
        }
        recorded
    });

    (format!("http://{addr}/cms/"), handle)
}

fn soap_result(rql_reply_escaped: &str) -> String {
    format!(
        r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><ExecuteResponse xmlns="http://tempuri.org/"><ExecuteResult>{rql_reply_escaped}</ExecuteResult><error/><resultInfo/></ExecuteResponse></s:Body></s:Envelope>"#
    )
}

#[test]
fn test_probe_then_execute() {
    let (url, server) = serve(vec![
        (
            200,
            "<html>Management Server 11.2&nbsp;Build&nbsp;11.2.1.5124</html>".to_string(),
        ),
        (200, soap_result("&lt;IODATA&gt;&lt;PROJECTS/&gt;&lt;/IODATA&gt;")),
    ]);

    let transport = HttpTransport::new("test", &url, TransportConfig::default()).unwrap();
    assert_eq!(
        transport.server_version().unwrap(),
        ServerVersion::new(11, 2, 1, 5124)
    );

    let reply = transport.send("<IODATA><PROJECTS action=\"list\"/></IODATA>").unwrap();
    assert_eq!(reply, "<IODATA><PROJECTS/></IODATA>");

    let recorded = server.join().unwrap();
    assert_eq!(recorded[0].request_line, "GET /cms/ioVersionInfo.asp HTTP/1.1");
    assert_eq!(
        recorded[1].request_line,
        "POST /cms/WebService/RQLWebService.svc HTTP/1.1"
    );
    assert_eq!(
        recorded[1].soap_action.as_deref(),
        Some("\"http://tempuri.org/RqlWebService/Execute\"")
    );
    assert!(recorded[1]
        .body
        .contains("<command>&lt;IODATA&gt;&lt;PROJECTS action=&quot;list&quot;/&gt;&lt;/IODATA&gt;</command>"));
}

#[test]
fn test_unrecognized_version_page_is_connection_failure() {
    let (url, server) = serve(vec![(200, "<html>It works!</html>".to_string())]);

    let transport = HttpTransport::new("test", &url, TransportConfig::default()).unwrap();
    let err = transport.server_version().unwrap_err();
    assert!(matches!(err, RqlError::Connection { .. }), "{err:?}");

    server.join().unwrap();
}

#[test]
fn test_unreachable_server_is_connection_failure() {
    // Bind and drop to get a port nobody listens on
    let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let transport = HttpTransport::new(
        "test",
        &format!("http://127.0.0.1:{port}/cms"),
        TransportConfig::default(),
    )
    .unwrap();

    let err = transport.server_version().unwrap_err();
    assert!(matches!(err, RqlError::Connection { .. }), "{err:?}");
}
