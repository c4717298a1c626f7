//! WMS/WMTS error taxonomy and exception report rendering.
//!
//! Mirrors the OGC `ServiceExceptionReport` (WMS) and OWS `ExceptionReport`
//! (WMTS) envelopes: a report wraps one or more `<ServiceException>` /
//! `<Exception>` elements, each carrying a `code`/`exceptionCode` attribute,
//! an optional `locator` attribute, and a free-text message.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
	MissingParameter,
	InvalidParameter,
	VersionNegotiationFailed,
	InvalidUpdateSequence,
	NoApplicableCode,
	InvalidFormat,
	InvalidCRS,
	LayerNotDefined,
	StyleNotDefined,
	LayerNotQueryable,
	InvalidPoint,
	MissingDimensionValue,
	InvalidDimensionValue,
	OperationNotSupported,
	TileOutOfRange,
	NotFound,
}

impl ErrorCode {
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			ErrorCode::MissingParameter => "MissingParameterValue",
			ErrorCode::InvalidParameter => "InvalidParameterValue",
			ErrorCode::VersionNegotiationFailed => "VersionNegotiationFailed",
			ErrorCode::InvalidUpdateSequence => "InvalidUpdateSequence",
			ErrorCode::NoApplicableCode => "NoApplicableCode",
			ErrorCode::InvalidFormat => "InvalidFormat",
			ErrorCode::InvalidCRS => "InvalidCRS",
			ErrorCode::LayerNotDefined => "LayerNotDefined",
			ErrorCode::StyleNotDefined => "StyleNotDefined",
			ErrorCode::LayerNotQueryable => "LayerNotQueryable",
			ErrorCode::InvalidPoint => "InvalidPoint",
			ErrorCode::MissingDimensionValue => "MissingDimensionValue",
			ErrorCode::InvalidDimensionValue => "InvalidDimensionValue",
			ErrorCode::OperationNotSupported => "OperationNotSupported",
			ErrorCode::TileOutOfRange => "TileOutOfRange",
			ErrorCode::NotFound => "NotFound",
		}
	}

	/// HTTP status chosen per error kind: 400 for invalid parameter/CRS/format
	/// and friends, 404 for tile-out-of-range and not-found, 500 for
	/// `NoApplicableCode`, 501 for `OperationNotSupported`.
	#[must_use]
	pub fn http_status(self) -> u16 {
		match self {
			ErrorCode::NoApplicableCode => 500,
			ErrorCode::OperationNotSupported => 501,
			ErrorCode::TileOutOfRange | ErrorCode::NotFound => 404,
			_ => 400,
		}
	}
}

/// Which OGC service envelope to render a report as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
	Wms,
	Wmts,
}

impl Service {
	fn report_tag(self) -> &'static str {
		match self {
			Service::Wms => "ServiceExceptionReport",
			Service::Wmts => "ExceptionReport",
		}
	}

	fn exception_tag(self) -> &'static str {
		match self {
			Service::Wms => "ServiceException",
			Service::Wmts => "Exception",
		}
	}

	fn code_attr(self) -> &'static str {
		match self {
			Service::Wms => "code",
			Service::Wmts => "exceptionCode",
		}
	}

	fn xmlns(self) -> &'static str {
		match self {
			Service::Wms => "http://www.opengis.net/ogc",
			Service::Wmts => "http://www.opengis.net/ows/1.1",
		}
	}
}

/// A structured, user-facing error for a WMS/WMTS/TMS request.
#[derive(Debug, Clone)]
pub struct ServiceError {
	pub code: ErrorCode,
	pub locator: Option<String>,
	pub message: String,
}

impl ServiceError {
	#[must_use]
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		ServiceError { code, locator: None, message: message.into() }
	}

	#[must_use]
	pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
		self.locator = Some(locator.into());
		self
	}

	#[must_use]
	pub fn http_status(&self) -> u16 {
		self.code.http_status()
	}

	/// Renders a single-exception report for `service`.
	#[must_use]
	pub fn to_xml(&self, service: Service) -> String {
		Self::report_xml(std::slice::from_ref(self), service)
	}

	/// Renders a multi-exception report. The HTTP status of a response
	/// carrying this body should come from the first entry's `http_status`.
	#[must_use]
	pub fn report_xml(errors: &[ServiceError], service: Service) -> String {
		let mut out = String::new();
		out.push_str(&format!("<{} xmlns=\"{}\">\n", service.report_tag(), service.xmlns()));
		for error in errors {
			render_exception(&mut out, error, service);
		}
		out.push_str(&format!("</{}>", service.report_tag()));
		out
	}
}

fn render_exception(out: &mut String, error: &ServiceError, service: Service) {
	out.push('<');
	out.push_str(service.exception_tag());
	out.push(' ');
	out.push_str(service.code_attr());
	out.push_str("=\"");
	out.push_str(error.code.as_str());
	out.push('"');
	if let Some(locator) = &error.locator {
		out.push_str(" locator=\"");
		out.push_str(&escape_xml(locator));
		out.push('"');
	}
	out.push_str(">\n  ");
	out.push_str(&escape_xml(&error.message));
	out.push_str("\n</");
	out.push_str(service.exception_tag());
	out.push_str(">\n");
}

fn escape_xml(text: &str) -> String {
	text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

impl fmt::Display for ServiceError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.code.as_str(), self.message)
	}
}

impl std::error::Error for ServiceError {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn wms_report_uses_service_exception_tag_and_code_attribute() {
		let error = ServiceError::new(ErrorCode::InvalidFormat, "unsupported FORMAT").with_locator("FORMAT");
		let xml = error.to_xml(Service::Wms);
		assert!(xml.starts_with("<ServiceExceptionReport xmlns=\"http://www.opengis.net/ogc\">"));
		assert!(xml.contains("<ServiceException code=\"InvalidFormat\" locator=\"FORMAT\">"));
		assert!(xml.ends_with("</ServiceExceptionReport>"));
	}

	#[test]
	fn wmts_report_uses_exception_code_attribute() {
		let error = ServiceError::new(ErrorCode::TileOutOfRange, "row out of range");
		let xml = error.to_xml(Service::Wmts);
		assert!(xml.contains("<Exception exceptionCode=\"TileOutOfRange\">"));
		assert!(xml.starts_with("<ExceptionReport xmlns=\"http://www.opengis.net/ows/1.1\">"));
	}

	#[test]
	fn http_status_mapping_matches_the_error_kind_table() {
		assert_eq!(ErrorCode::MissingParameter.http_status(), 400);
		assert_eq!(ErrorCode::InvalidCRS.http_status(), 400);
		assert_eq!(ErrorCode::TileOutOfRange.http_status(), 404);
		assert_eq!(ErrorCode::NotFound.http_status(), 404);
		assert_eq!(ErrorCode::NoApplicableCode.http_status(), 500);
		assert_eq!(ErrorCode::OperationNotSupported.http_status(), 501);
	}

	#[test]
	fn report_xml_concatenates_every_exception() {
		let errors = vec![
			ServiceError::new(ErrorCode::MissingParameter, "missing LAYERS"),
			ServiceError::new(ErrorCode::MissingParameter, "missing FORMAT"),
		];
		let xml = ServiceError::report_xml(&errors, Service::Wms);
		assert_eq!(xml.matches("<ServiceException").count(), 2);
	}

	#[test]
	fn message_and_locator_are_escaped() {
		let error = ServiceError::new(ErrorCode::InvalidParameter, "bad <value> & \"quotes\"");
		let xml = error.to_xml(Service::Wms);
		assert!(xml.contains("bad &lt;value&gt; &amp; &quot;quotes&quot;"));
	}
}
