//! Canned feed responses for walker, coordinator and retry tests.

use crate::api::FeedFetcher;
use crate::error::FetchError;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Canned {
    Page(String),
    Failure(u16),
}

/// Serves queued responses per URL; the last response for a URL repeats.
/// Unknown URLs answer with a 404 transport error.
#[derive(Debug, Default)]
pub struct FixtureFetcher {
    responses: HashMap<String, Vec<Canned>>,
    served: Mutex<HashMap<String, usize>>,
    requests: Mutex<Vec<String>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.responses
            .entry(url.to_string())
            .or_default()
            .push(Canned::Page(body.to_string()));
        self
    }

    pub fn with_failure(mut self, url: &str, status: u16) -> Self {
        self.responses
            .entry(url.to_string())
            .or_default()
            .push(Canned::Failure(status));
        self
    }

    /// Every URL requested so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl FeedFetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());

        let canned = self.responses.get(url).and_then(|queue| {
            let mut served = self.served.lock().unwrap();
            let count = served.entry(url.to_string()).or_insert(0);
            let response = queue.get(*count).or_else(|| queue.last()).cloned();
            *count += 1;
            response
        });

        match canned {
            Some(Canned::Page(body)) => Ok(body),
            Some(Canned::Failure(status)) => Err(FetchError::Transport {
                url: url.to_string(),
                status: Some(status),
                message: format!("HTTP {status}"),
            }),
            None => Err(FetchError::Transport {
                url: url.to_string(),
                status: Some(404),
                message: "no fixture for URL".to_string(),
            }),
        }
    }
}

/// Minimal Atom page with one award entry per PIID.
pub fn feed_page(piids: &[&str], next: Option<&str>) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:ns1="https://www.fpds.gov/FPDS">
  <title type="html">FPDS-NG Search Results</title>
"#,
    );
    if let Some(href) = next {
        xml.push_str(&format!("  <link rel=\"next\" href=\"{}\"/>\n", href.replace('&', "&amp;")));
    }
    for piid in piids {
        xml.push_str(&format!(
            r#"  <entry>
    <title>award {piid}</title>
    <modified>2023-11-02 09:14:07</modified>
    <content type="application/xml">
      <ns1:award>
        <ns1:awardID><ns1:awardContractID><ns1:PIID>{piid}</ns1:PIID><ns1:modNumber>0</ns1:modNumber></ns1:awardContractID></ns1:awardID>
        <ns1:dollarValues><ns1:obligatedAmount>1000.00</ns1:obligatedAmount></ns1:dollarValues>
      </ns1:award>
    </content>
  </entry>
"#
        ));
    }
    xml.push_str("</feed>\n");
    xml
}
