//! Parsing of vendor tool output.
//!
//! altool prints an XML property list, but diagnostics and warnings can be
//! interleaved ahead of it. Parsing is two-phase: a line classifier finds the
//! first line that starts the payload, then only that range is decoded and
//! checked against the expected shape. notarytool prints human-readable
//! progress instead, which is scanned for its `id:` and `status:` lines.
use crate::error::NotarizeError;
use plist::{Dictionary, Value};
use std::io::Cursor;

/// First characters of a line that begins the structured payload.
pub const PAYLOAD_MARKER: &str = "<?xml";

const PRODUCT_ERRORS_KEY: &str = "product-errors";

/// Output lines split at the payload marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSplit<'a> {
    pub diagnostics: &'a [String],
    pub payload: Option<&'a [String]>,
}

/// Classify lines into diagnostics and payload. Everything before the first
/// marker line is diagnostic; everything from it onward is payload.
pub fn split_payload(lines: &[String]) -> PayloadSplit<'_> {
    match lines.iter().position(|line| line.starts_with(PAYLOAD_MARKER)) {
        Some(start) => PayloadSplit {
            diagnostics: &lines[..start],
            payload: Some(&lines[start..]),
        },
        None => PayloadSplit {
            diagnostics: lines,
            payload: None,
        },
    }
}

/// One `(code, message)` entry from the payload's error list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductError {
    pub code: i64,
    pub message: String,
}

/// Decoded result of one altool invocation.
#[derive(Debug, Clone)]
pub struct StructuredResponse {
    tool: &'static str,
    fields: Option<Dictionary>,
    errors: Vec<ProductError>,
    diagnostics: Vec<String>,
    raw: Vec<String>,
}

impl StructuredResponse {
    /// Parse raw output lines. Missing payload yields an error-only response;
    /// a payload that is present but malformed is a parse failure.
    pub fn parse(tool: &'static str, lines: &[String]) -> Result<Self, NotarizeError> {
        let split = split_payload(lines);
        let diagnostics = split.diagnostics.to_vec();
        let Some(payload) = split.payload else {
            return Ok(Self {
                tool,
                fields: None,
                errors: Vec::new(),
                diagnostics,
                raw: lines.to_vec(),
            });
        };

        let parse_error = |reason: String| NotarizeError::Parse {
            tool,
            reason,
            output: lines.to_vec(),
        };

        let text = payload.join("\n");
        let value = Value::from_reader_xml(Cursor::new(text.as_bytes()))
            .map_err(|err| parse_error(format!("malformed property list: {err}")))?;
        let mut fields = value
            .into_dictionary()
            .ok_or_else(|| parse_error("property list root is not a dictionary".to_string()))?;
        let errors = match fields.remove(PRODUCT_ERRORS_KEY) {
            Some(value) => decode_product_errors(&value).map_err(parse_error)?,
            None => Vec::new(),
        };

        Ok(Self {
            tool,
            fields: Some(fields),
            errors,
            diagnostics,
            raw: lines.to_vec(),
        })
    }

    /// True when the output carried no structured payload at all.
    pub fn is_error_only(&self) -> bool {
        self.fields.is_none()
    }

    /// Fail unless a payload was decoded.
    pub fn require_payload(self) -> Result<Self, NotarizeError> {
        if self.is_error_only() {
            return Err(NotarizeError::Parse {
                tool: self.tool,
                reason: "no property list found in output".to_string(),
                output: self.raw,
            });
        }
        Ok(self)
    }

    pub fn errors(&self) -> &[ProductError] {
        &self.errors
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    pub fn raw(&self) -> &[String] {
        &self.raw
    }

    /// Look up a string through nested dictionaries, e.g.
    /// `["notarization-upload", "RequestUUID"]`.
    pub fn string_field(&self, path: &[&str]) -> Result<&str, NotarizeError> {
        self.optional_string_field(path).ok_or_else(|| NotarizeError::Parse {
            tool: self.tool,
            reason: format!("missing string field {}", path.join(".")),
            output: self.raw.clone(),
        })
    }

    pub fn optional_string_field(&self, path: &[&str]) -> Option<&str> {
        let (last, parents) = path.split_last()?;
        let mut dict = self.fields.as_ref()?;
        for key in parents {
            dict = dict.get(key)?.as_dictionary()?;
        }
        dict.get(last)?.as_string()
    }
}

fn decode_product_errors(value: &Value) -> Result<Vec<ProductError>, String> {
    let entries = value
        .as_array()
        .ok_or_else(|| format!("{PRODUCT_ERRORS_KEY} is not an array"))?;
    let mut errors = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        let dict = entry
            .as_dictionary()
            .ok_or_else(|| format!("{PRODUCT_ERRORS_KEY}[{idx}] is not a dictionary"))?;
        let code = dict
            .get("code")
            .and_then(decode_code)
            .ok_or_else(|| format!("{PRODUCT_ERRORS_KEY}[{idx}] has no integer code"))?;
        let message = dict
            .get("message")
            .and_then(Value::as_string)
            .ok_or_else(|| format!("{PRODUCT_ERRORS_KEY}[{idx}] has no message"))?;
        errors.push(ProductError {
            code,
            message: message.to_string(),
        });
    }
    Ok(errors)
}

fn decode_code(value: &Value) -> Option<i64> {
    value
        .as_signed_integer()
        .or_else(|| value.as_string().and_then(|text| text.trim().parse().ok()))
}

/// Details scraped from notarytool's progress text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegratedProgress {
    /// Token following the first `id:` line.
    pub submission_id: Option<String>,
    /// Text following the last `status:` line.
    pub status: Option<String>,
}

impl IntegratedProgress {
    pub fn scan(lines: &[String]) -> Self {
        let mut progress = Self::default();
        for line in lines {
            let line = line.trim();
            if progress.submission_id.is_none() {
                if let Some(rest) = line.strip_prefix("id:") {
                    progress.submission_id = rest.split_whitespace().next().map(str::to_string);
                    continue;
                }
            }
            if let Some(rest) = line.strip_prefix("status:") {
                let status = rest.trim();
                if !status.is_empty() {
                    progress.status = Some(status.to_string());
                }
            }
        }
        progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    const UPLOAD_OK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>notarization-upload</key>
	<dict>
		<key>RequestUUID</key>
		<string>2efe2717-52ef-43a5-96dc-0797e4ca1041</string>
	</dict>
	<key>os-version</key>
	<string>10.15.7</string>
	<key>success-message</key>
	<string>No errors uploading 'MyApp.zip'.</string>
</dict>
</plist>"#;

    const DUPLICATE: &str = r#"2019-10-04 10:11:12.345 altool[1234:5678] *** Error: ERROR ITMS-90732
<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
	<key>product-errors</key>
	<array>
		<dict>
			<key>code</key>
			<integer>-18000</integer>
			<key>message</key>
			<string>ERROR ITMS-90732: "The software asset has already been uploaded. The upload ID is 09039bec-35e9-4cf2-af2f-30a64ef33190"</string>
		</dict>
	</array>
</dict>
</plist>"#;

    #[test]
    fn split_separates_diagnostics_from_payload() {
        let output = lines(DUPLICATE);
        let split = split_payload(&output);
        assert_eq!(split.diagnostics.len(), 1);
        let payload = split.payload.expect("payload found");
        assert!(payload[0].starts_with(PAYLOAD_MARKER));
        assert_eq!(payload.last().map(String::as_str), Some("</plist>"));
    }

    #[test]
    fn split_without_marker_keeps_everything_as_diagnostics() {
        let output = lines("Error: could not connect\nplease retry");
        let split = split_payload(&output);
        assert!(split.payload.is_none());
        assert_eq!(split.diagnostics, output.as_slice());
    }

    #[test]
    fn marker_must_start_the_line() {
        let output = lines("warning: saw <?xml in the middle\nnothing else");
        assert!(split_payload(&output).payload.is_none());
    }

    #[test]
    fn parses_upload_identifier() {
        let response = StructuredResponse::parse("altool", &lines(UPLOAD_OK)).expect("parse");
        assert!(!response.is_error_only());
        assert!(response.errors().is_empty());
        assert_eq!(
            response
                .string_field(&["notarization-upload", "RequestUUID"])
                .expect("uuid"),
            "2efe2717-52ef-43a5-96dc-0797e4ca1041"
        );
        assert_eq!(
            response.optional_string_field(&["os-version"]),
            Some("10.15.7")
        );
    }

    #[test]
    fn parses_error_list_and_keeps_diagnostics() {
        let response = StructuredResponse::parse("altool", &lines(DUPLICATE)).expect("parse");
        assert_eq!(response.errors().len(), 1);
        assert_eq!(response.errors()[0].code, -18000);
        assert!(response.errors()[0]
            .message
            .contains("09039bec-35e9-4cf2-af2f-30a64ef33190"));
        assert_eq!(response.diagnostics().len(), 1);
    }

    #[test]
    fn output_without_payload_is_error_only() {
        let output = lines("xcrun: error: unable to find utility \"altool\"");
        let response = StructuredResponse::parse("altool", &output).expect("parse");
        assert!(response.is_error_only());
        assert!(response.string_field(&["notarization-info", "Status"]).is_err());
        let err = response.require_payload().expect_err("error-only");
        assert!(matches!(err, NotarizeError::Parse { .. }));
        assert_eq!(err.captured_output(), output.as_slice());
    }

    #[test]
    fn malformed_payload_is_a_parse_error() {
        let output = lines("<?xml version=\"1.0\"?>\n<plist version=\"1.0\"><dict><key>a</key>");
        let err = StructuredResponse::parse("altool", &output).expect_err("malformed");
        assert!(matches!(err, NotarizeError::Parse { .. }));
    }

    #[test]
    fn error_entries_without_codes_are_rejected() {
        let output = lines(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
	<key>product-errors</key>
	<array>
		<dict>
			<key>message</key>
			<string>no code here</string>
		</dict>
	</array>
</dict>
</plist>"#,
        );
        let err = StructuredResponse::parse("altool", &output).expect_err("invalid schema");
        assert!(err.to_string().contains("has no integer code"));
    }

    #[test]
    fn string_codes_are_accepted() {
        let output = lines(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
	<key>product-errors</key>
	<array>
		<dict>
			<key>code</key>
			<string>1519</string>
			<key>message</key>
			<string>Could not find the RequestUUID.</string>
		</dict>
	</array>
</dict>
</plist>"#,
        );
        let response = StructuredResponse::parse("altool", &output).expect("parse");
        assert_eq!(response.errors()[0].code, 1519);
    }

    #[test]
    fn scans_notarytool_progress() {
        let output = lines(
            "Conducting pre-submission checks for MyApp.zip and initiating connection to the Apple notary service...\n\
             Submission ID received\n  id: 4e7a9c52-8f5d-4b3f-9a63-2c7c1a1e0f11\n\
             Successfully uploaded file\n  id: 4e7a9c52-8f5d-4b3f-9a63-2c7c1a1e0f11\n  path: /tmp/MyApp.zip\n\
             Waiting for processing to complete.\nCurrent status: Accepted........\n\
             Processing complete\n  id: 4e7a9c52-8f5d-4b3f-9a63-2c7c1a1e0f11\n  status: Accepted",
        );
        let progress = IntegratedProgress::scan(&output);
        assert_eq!(
            progress.submission_id.as_deref(),
            Some("4e7a9c52-8f5d-4b3f-9a63-2c7c1a1e0f11")
        );
        assert_eq!(progress.status.as_deref(), Some("Accepted"));
    }

    #[test]
    fn scan_without_id_line_finds_nothing() {
        let progress = IntegratedProgress::scan(&lines("Error: HTTP status code: 401."));
        assert_eq!(progress, IntegratedProgress::default());
    }
}
