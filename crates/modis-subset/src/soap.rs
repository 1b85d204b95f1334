//! SOAP client for the ORNL DAAC MODIS web service.
//!
//! The service speaks RPC-style SOAP 1.1. Requests are small enough to be
//! written by hand; responses are flattened into their leaf elements with
//! quick-xml and picked apart by element name.

use std::borrow::Cow;

use async_trait::async_trait;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{header, Client};
use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::error::{ModisError, Result};
use crate::service::{GridMetadata, ModisService, SubsetRequest, SubsetResponse};

/// Namespace of the MODIS web service operations.
pub const SERVICE_NAMESPACE: &str = "http://daac.ornl.gov/MODIS_webservice";

const ENVELOPE_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// `ModisService` backed by the ORNL DAAC SOAP endpoint.
pub struct SoapModisClient {
    client: Client,
    endpoint: String,
}

impl SoapModisClient {
    /// Create a client from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// Issue one SOAP call and return the leaf elements of the response.
    async fn call(&self, operation: &str, args: &[(&str, String)]) -> Result<Vec<Leaf>> {
        let body = build_envelope(operation, args);
        debug!(operation = operation, endpoint = %self.endpoint, "SOAP request");

        let response = self
            .client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", format!("\"{}#{}\"", SERVICE_NAMESPACE, operation))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        // Faults usually arrive with a 500 status, so look for one first.
        let leaves = match parse_leaves(&text) {
            Ok(leaves) => leaves,
            Err(e) if status.is_success() => return Err(e),
            Err(_) => {
                return Err(ModisError::remote_unavailable(format!(
                    "{} returned HTTP {}",
                    operation, status
                )))
            }
        };

        if let Some(fault) = find(&leaves, "faultstring") {
            return Err(ModisError::soap(format!("{} fault: {}", operation, fault)));
        }

        if !status.is_success() {
            return Err(ModisError::remote_unavailable(format!(
                "{} returned HTTP {}",
                operation, status
            )));
        }

        Ok(leaves)
    }

    async fn call_list(&self, operation: &str, args: &[(&str, String)]) -> Result<Vec<String>> {
        let leaves = self.call(operation, args).await?;
        let values = list_values(&leaves);

        if values.is_empty() {
            return Err(ModisError::remote_unavailable(format!(
                "{} returned an empty list",
                operation
            )));
        }

        Ok(values)
    }
}

#[async_trait]
impl ModisService for SoapModisClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn products(&self) -> Result<Vec<String>> {
        self.call_list("getproducts", &[]).await
    }

    async fn bands(&self, product: &str) -> Result<Vec<String>> {
        self.call_list("getbands", &[("Product", product.to_string())])
            .await
    }

    async fn dates(&self, latitude: f64, longitude: f64, product: &str) -> Result<Vec<String>> {
        self.call_list(
            "getdates",
            &[
                ("Latitude", latitude.to_string()),
                ("Longitude", longitude.to_string()),
                ("Product", product.to_string()),
            ],
        )
        .await
    }

    #[instrument(skip(self, request), fields(start = %request.start_date, end = %request.end_date))]
    async fn subset(&self, request: &SubsetRequest) -> Result<SubsetResponse> {
        let leaves = self
            .call(
                "getsubset",
                &[
                    ("Latitude", request.latitude.to_string()),
                    ("Longitude", request.longitude.to_string()),
                    ("Product", request.product.clone()),
                    ("Band", request.band.clone()),
                    ("MODIS_Subset_Start_Date", request.start_date.clone()),
                    ("MODIS_Subset_End_Date", request.end_date.clone()),
                    ("Km_Above_Below", request.km_above_below.to_string()),
                    ("Km_Left_Right", request.km_left_right.to_string()),
                ],
            )
            .await?;

        subset_from_leaves(&leaves)
    }
}

/// A text-bearing element of a response: its name, its parent's name and
/// its text.
#[derive(Debug, Clone, PartialEq)]
struct Leaf {
    parent: String,
    name: String,
    text: String,
}

fn build_envelope(operation: &str, args: &[(&str, String)]) -> String {
    let mut params = String::new();
    for (name, value) in args {
        params.push_str(&format!("<{0}>{1}</{0}>", name, escape(value.as_str())));
    }

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<soap:Envelope xmlns:soap="{env}" xmlns:mws="{ns}">"#,
            "<soap:Body><mws:{op}>{params}</mws:{op}></soap:Body>",
            "</soap:Envelope>"
        ),
        env = ENVELOPE_NAMESPACE,
        ns = SERVICE_NAMESPACE,
        op = operation,
        params = params
    )
}

fn parse_leaves(xml: &str) -> Result<Vec<Leaf>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut leaves = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                stack.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(e) => push_leaf(&mut leaves, &stack, e.unescape()?),
            Event::CData(e) => {
                let bytes = e.into_inner();
                push_leaf(&mut leaves, &stack, String::from_utf8_lossy(&bytes));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if leaves.is_empty() && !xml.contains("Envelope") {
        return Err(ModisError::soap("response is not a SOAP envelope"));
    }

    Ok(leaves)
}

fn push_leaf(leaves: &mut Vec<Leaf>, stack: &[String], text: Cow<'_, str>) {
    let Some(name) = stack.last() else {
        return;
    };
    let parent = if stack.len() >= 2 {
        stack[stack.len() - 2].clone()
    } else {
        String::new()
    };

    leaves.push(Leaf {
        parent,
        name: name.clone(),
        text: text.into_owned(),
    });
}

fn find<'a>(leaves: &'a [Leaf], name: &str) -> Option<&'a str> {
    leaves
        .iter()
        .find(|l| l.name == name)
        .map(|l| l.text.as_str())
}

fn list_values(leaves: &[Leaf]) -> Vec<String> {
    leaves
        .iter()
        .map(|l| l.text.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn field<T: std::str::FromStr>(leaves: &[Leaf], name: &str) -> Result<T> {
    let raw = find(leaves, name).ok_or_else(|| {
        ModisError::remote_unavailable(format!("subset response is missing {}", name))
    })?;

    raw.trim().parse().map_err(|_| {
        ModisError::remote_unavailable(format!("subset response has invalid {}: {:?}", name, raw))
    })
}

fn subset_from_leaves(leaves: &[Leaf]) -> Result<SubsetResponse> {
    let grid = GridMetadata {
        nrows: field(leaves, "nrows")?,
        ncols: field(leaves, "ncols")?,
        cellsize: field(leaves, "cellsize")?,
        scale: field(leaves, "scale")?,
        units: find(leaves, "units").unwrap_or_default().to_string(),
        xllcorner: field(leaves, "xllcorner")?,
        yllcorner: field(leaves, "yllcorner")?,
    };

    let subset: Vec<String> = leaves
        .iter()
        .filter(|l| l.parent == "subset")
        .map(|l| l.text.clone())
        .collect();

    if subset.is_empty() {
        return Err(ModisError::remote_unavailable("subset response has no rows"));
    }

    grid.cells()?;

    Ok(SubsetResponse { grid, subset })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATES_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <getdatesResponse xmlns="http://daac.ornl.gov/MODIS_webservice">
      <return>
        <item>A2006097</item>
        <item>A2006105</item>
        <item>A2006113</item>
      </return>
    </getdatesResponse>
  </soap:Body>
</soap:Envelope>"#;

    const SUBSET_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <getsubsetResponse xmlns="http://daac.ornl.gov/MODIS_webservice">
      <return>
        <xllcorner>-138034.26</xllcorner>
        <yllcorner>5782144.99</yllcorner>
        <cellsize>463.312716527</cellsize>
        <nrows>1</nrows>
        <ncols>3</ncols>
        <band>Lai_500m</band>
        <units>m^2/m^2</units>
        <scale>0.1</scale>
        <latitude>52</latitude>
        <longitude>-2</longitude>
        <header>HDFname,Product,Date,Location,ProcessDate,Band</header>
        <subset>
          <item>MOD15A2H.A2006105.h17v03,MOD15A2H,A2006105,Lat52Lon-2,2015148,11,12,13</item>
          <item>MOD15A2H.A2006113.h17v03,MOD15A2H,A2006113,Lat52Lon-2,2015148,21,22,23</item>
        </subset>
      </return>
    </getsubsetResponse>
  </soap:Body>
</soap:Envelope>"#;

    const FAULT_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <soap:Fault>
      <faultcode>soap:Server</faultcode>
      <faultstring>Invalid product &amp; band</faultstring>
    </soap:Fault>
  </soap:Body>
</soap:Envelope>"#;

    #[test]
    fn test_build_envelope() {
        let xml = build_envelope("getbands", &[("Product", "MOD15A2H<&>".to_string())]);
        assert!(xml.contains(
            "<mws:getbands><Product>MOD15A2H&lt;&amp;&gt;</Product></mws:getbands>"
        ));
        assert!(xml.contains(SERVICE_NAMESPACE));
        assert!(xml.contains(ENVELOPE_NAMESPACE));
    }

    #[test]
    fn test_parse_date_list() {
        let leaves = parse_leaves(DATES_RESPONSE).unwrap();
        assert_eq!(list_values(&leaves), vec!["A2006097", "A2006105", "A2006113"]);
    }

    #[test]
    fn test_parse_subset() {
        let leaves = parse_leaves(SUBSET_RESPONSE).unwrap();
        let response = subset_from_leaves(&leaves).unwrap();

        assert_eq!(response.grid.nrows, 1);
        assert_eq!(response.grid.ncols, 3);
        assert_eq!(response.grid.units, "m^2/m^2");
        assert!((response.grid.scale - 0.1).abs() < 1e-12);
        assert!((response.grid.xllcorner + 138034.26).abs() < 1e-6);
        assert_eq!(response.subset.len(), 2);
        assert!(response.subset[1].ends_with("21,22,23"));
    }

    #[test]
    fn test_subset_missing_grid_is_remote_unavailable() {
        let leaves = parse_leaves(DATES_RESPONSE).unwrap();
        assert!(matches!(
            subset_from_leaves(&leaves),
            Err(ModisError::RemoteUnavailable(_))
        ));
    }

    #[test]
    fn test_subset_garbled_grid_is_remote_unavailable() {
        let zero = SUBSET_RESPONSE.replace("<ncols>3</ncols>", "<ncols>0</ncols>");
        let leaves = parse_leaves(&zero).unwrap();
        assert!(matches!(
            subset_from_leaves(&leaves),
            Err(ModisError::RemoteUnavailable(_))
        ));

        let huge = SUBSET_RESPONSE.replace(
            "<nrows>1</nrows>",
            &format!("<nrows>{}</nrows>", usize::MAX),
        );
        let leaves = parse_leaves(&huge).unwrap();
        assert!(matches!(
            subset_from_leaves(&leaves),
            Err(ModisError::RemoteUnavailable(_))
        ));
    }

    #[test]
    fn test_fault_string() {
        let leaves = parse_leaves(FAULT_RESPONSE).unwrap();
        assert_eq!(find(&leaves, "faultstring"), Some("Invalid product & band"));
    }

    #[test]
    fn test_unreachable_endpoint_is_http_error() {
        let config = ClientConfig {
            endpoint: "http://127.0.0.1:9/soap".to_string(),
            timeout_secs: 5,
            ..Default::default()
        };
        let client = SoapModisClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:9/soap");

        let result = tokio_test::block_on(client.products());
        assert!(matches!(result, Err(ModisError::Http(_))));
    }

    #[test]
    fn test_rejects_non_xml() {
        assert!(parse_leaves("busy").is_err());
        assert!(parse_leaves("").is_err());
    }
}
