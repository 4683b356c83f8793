//! RQL protocol plumbing for talking to a RedDot / OpenText Management Server.
//!
//! RQL is the XML query language the server speaks. A query is wrapped in an
//! `IODATA` envelope carrying the login guid and/or session key, framed as a
//! SOAP `Execute` call and posted to a version dependent endpoint:
//!
//! ```text
//! <IODATA loginguid="...">            SOAP Execute(command, error, resultInfo)
//!   <ADMINISTRATION>           ──▶    POST <base>/WebService/RQLWebService.svc   (>= 11)
//!     <PROJECTS action="list"/>       POST <base>/webservice/RDCMSXMLServer.WSDL (<  11)
//!   </ADMINISTRATION>
//! </IODATA>
//! ```
//!
//! # Architecture
//!
//! - **Envelope** (`envelope.rs`): the six `IODATA` shapes and the session key placeholder
//! - **SOAP** (`soap.rs`): request bodies and response/fault parsing for both endpoint flavours
//! - **Probe** (`probe.rs`): server version from `ioVersionInfo.asp`
//! - **Transport** (`transport.rs`): the [`Transport`] trait and its HTTP implementation
//!
//! # Example
//!
//! ```rust,no_run
//! use reddot_rql::{Credentials, HttpTransport, IoDataFormat, Transport, TransportConfig};
//!
//! # fn example() -> reddot_rql::Result<()> {
//! let transport = HttpTransport::new("cms", "http://cms.example.com/cms/", TransportConfig::default())?;
//! println!("server version {}", transport.server_version()?);
//! let reply = transport.execute(
//!     "<ADMINISTRATION><PROJECTS action=\"list\"/></ADMINISTRATION>",
//!     IoDataFormat::LogonGuidOnly,
//!     Credentials { login_guid: "4E2C3A1F0B8D4D6A9E7F112233445566", session_key: "" },
//! )?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```

pub mod envelope;
pub mod error;
pub mod probe;
pub mod redact;
pub mod soap;
pub mod transport;

// Re-export key types
pub use envelope::{Credentials, IoDataFormat, SESSION_KEY_PLACEHOLDER};
pub use error::{Result, RqlError};
pub use soap::SoapDialect;
pub use transport::{HttpTransport, Transport, TransportConfig};
