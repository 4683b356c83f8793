//! SOAP framing of the `Execute` call.
//!
//! Servers before version 11 expose the classic `RDCMSXMLServer` endpoint,
//! later ones the WCF `RqlWebService`. Both take the enveloped RQL as a string
//! plus `error`/`resultInfo` in/out parameters and return the RQL reply as a
//! string.

use quick_xml::escape::escape;
use reddot_core::{ServerVersion, XmlDocument, XmlElement};

use crate::error::{Result, RqlError};

const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Which web service flavour a server speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoapDialect {
    /// `webservice/RDCMSXMLServer.WSDL`, servers before version 11
    XmlServer,
    /// `WebService/RQLWebService.svc`, version 11 and later
    RqlWebService,
}

struct Names {
    path: &'static str,
    action: &'static str,
    namespace: &'static str,
    command: &'static str,
    error: &'static str,
    result_info: &'static str,
    result: &'static str,
}

const XML_SERVER: Names = Names {
    path: "webservice/RDCMSXMLServer.WSDL",
    action: "http://tempuri.org/RDCMSXMLServer/action/XmlServer.Execute",
    namespace: "http://tempuri.org/RDCMSXMLServer/message/",
    command: "sParamA",
    error: "sErrorA",
    result_info: "sResultInfoA",
    result: "Result",
};

const RQL_WEB_SERVICE: Names = Names {
    path: "WebService/RQLWebService.svc",
    action: "http://tempuri.org/RqlWebService/Execute",
    namespace: "http://tempuri.org/",
    command: "command",
    error: "error",
    result_info: "resultInfo",
    result: "ExecuteResult",
};

impl SoapDialect {
    pub fn for_version(version: &ServerVersion) -> Self {
        if version.major >= 11 {
            SoapDialect::RqlWebService
        } else {
            SoapDialect::XmlServer
        }
    }

    fn names(&self) -> &'static Names {
        match self {
            SoapDialect::XmlServer => &XML_SERVER,
            SoapDialect::RqlWebService => &RQL_WEB_SERVICE,
        }
    }

    /// Endpoint path relative to the server's base URL
    pub fn path(&self) -> &'static str {
        self.names().path
    }

    /// Value of the `SOAPAction` header (unquoted)
    pub fn soap_action(&self) -> &'static str {
        self.names().action
    }

    /// SOAP 1.1 request body for one `Execute` call
    pub fn request(&self, rql: &str) -> String {
        let n = self.names();
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="utf-8"?>"#,
                r#"<s:Envelope xmlns:s="{envelope}"><s:Body>"#,
                r#"<Execute xmlns="{ns}"><{cmd}>{rql}</{cmd}><{err}></{err}><{info}></{info}></Execute>"#,
                r#"</s:Body></s:Envelope>"#
            ),
            envelope = SOAP_ENVELOPE_NS,
            ns = n.namespace,
            cmd = n.command,
            err = n.error,
            info = n.result_info,
            rql = escape(rql),
        )
    }

    /// Extract the RQL reply from a SOAP response body.
    ///
    /// A fault or a non-empty error parameter becomes [`RqlError::Server`].
    pub fn parse_response(&self, server: &str, body: &str) -> Result<String> {
        let n = self.names();
        let document = XmlDocument::parse(body).map_err(|e| RqlError::Soap(e.to_string()))?;
        let envelope = document
            .root()
            .ok_or_else(|| RqlError::Soap("empty response".into()))?;

        if let Some(fault) = find_local(envelope, "Fault") {
            let message = find_local(fault, "faultstring")
                .map(XmlElement::inner_text)
                .unwrap_or_else(|| fault.inner_text());
            return Err(RqlError::server(server, message.trim(), ""));
        }

        let result = find_local(envelope, n.result)
            .map(XmlElement::inner_text)
            .ok_or_else(|| RqlError::Soap(format!("no <{}> in response", n.result)))?;

        let error = find_local(envelope, n.error)
            .map(XmlElement::inner_text)
            .unwrap_or_default();
        if !error.trim().is_empty() {
            return Err(RqlError::server(server, error.trim(), result));
        }

        Ok(result)
    }
}

/// First element in document order whose local name is `name`
fn find_local<'a>(element: &'a XmlElement, name: &str) -> Option<&'a XmlElement> {
    if element.local_name() == name {
        return Some(element);
    }
    element.children().find_map(|child| find_local(child, name))
}
