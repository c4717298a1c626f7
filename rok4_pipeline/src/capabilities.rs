//! Minimal `GetCapabilities` XML for WMS and WMTS.
//!
//! Full schema compliance is out of scope; this produces a well-formed
//! document naming the served layers, their CRS and bounding box, and (for
//! WMTS) the tile matrix set and output formats, without the full optional
//! metadata (keywords, contact info, extended capabilities) a spec-complete
//! document would carry.

use rok4_geometry::BoundingBox;

/// One served layer, as it should appear in a capabilities document.
pub struct LayerCapabilities<'a> {
	pub name: &'a str,
	pub title: &'a str,
	pub crs: &'a str,
	pub bbox: BoundingBox,
	pub formats: &'a [&'a str],
}

fn escape_xml(text: &str) -> String {
	text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// Renders a minimal WMS `1.3.0` `WMS_Capabilities` document.
#[must_use]
pub fn wms_capabilities(layers: &[LayerCapabilities]) -> String {
	let mut out = String::new();
	out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
	out.push_str("<WMS_Capabilities version=\"1.3.0\" xmlns=\"http://www.opengis.net/wms\">\n");
	out.push_str("  <Service><Name>WMS</Name><Title>rok4</Title></Service>\n");
	out.push_str("  <Capability>\n");
	out.push_str("    <Request>\n");
	out.push_str("      <GetCapabilities><Format>text/xml</Format></GetCapabilities>\n");
	out.push_str("      <GetMap><Format>image/png</Format><Format>image/jpeg</Format><Format>image/tiff</Format></GetMap>\n");
	out.push_str("      <GetFeatureInfo><Format>text/plain</Format></GetFeatureInfo>\n");
	out.push_str("    </Request>\n");
	out.push_str("    <Layer>\n");
	for layer in layers {
		out.push_str("      <Layer queryable=\"1\">\n");
		out.push_str(&format!("        <Name>{}</Name>\n", escape_xml(layer.name)));
		out.push_str(&format!("        <Title>{}</Title>\n", escape_xml(layer.title)));
		out.push_str(&format!("        <CRS>{}</CRS>\n", escape_xml(layer.crs)));
		out.push_str(&format!(
			"        <BoundingBox CRS=\"{}\" minx=\"{}\" miny=\"{}\" maxx=\"{}\" maxy=\"{}\"/>\n",
			escape_xml(layer.crs),
			layer.bbox.xmin,
			layer.bbox.ymin,
			layer.bbox.xmax,
			layer.bbox.ymax
		));
		out.push_str("      </Layer>\n");
	}
	out.push_str("    </Layer>\n");
	out.push_str("  </Capability>\n");
	out.push_str("</WMS_Capabilities>");
	out
}

/// Renders a minimal WMTS `1.0.0` `Capabilities` document (OWS namespace).
#[must_use]
pub fn wmts_capabilities(layers: &[LayerCapabilities], tile_matrix_set_name: &str) -> String {
	let mut out = String::new();
	out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
	out.push_str("<Capabilities version=\"1.0.0\" xmlns=\"http://www.opengis.net/wmts/1.0\" xmlns:ows=\"http://www.opengis.net/ows/1.1\">\n");
	out.push_str("  <ows:ServiceIdentification><ows:Title>rok4</ows:Title><ows:ServiceType>OGC WMTS</ows:ServiceType></ows:ServiceIdentification>\n");
	out.push_str("  <Contents>\n");
	for layer in layers {
		out.push_str("    <Layer>\n");
		out.push_str(&format!("      <ows:Title>{}</ows:Title>\n", escape_xml(layer.title)));
		out.push_str(&format!("      <ows:Identifier>{}</ows:Identifier>\n", escape_xml(layer.name)));
		for format in layer.formats {
			out.push_str(&format!("      <Format>{}</Format>\n", escape_xml(format)));
		}
		out.push_str(&format!("      <TileMatrixSetLink><TileMatrixSet>{}</TileMatrixSet></TileMatrixSetLink>\n", escape_xml(tile_matrix_set_name)));
		out.push_str("    </Layer>\n");
	}
	out.push_str(&format!("    <TileMatrixSet><ows:Identifier>{}</ows:Identifier></TileMatrixSet>\n", escape_xml(tile_matrix_set_name)));
	out.push_str("  </Contents>\n");
	out.push_str("</Capabilities>");
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn layer() -> LayerCapabilities<'static> {
		LayerCapabilities {
			name: "ortho",
			title: "Orthophoto",
			crs: "EPSG:3857",
			bbox: BoundingBox { xmin: 0.0, ymin: 0.0, xmax: 100.0, ymax: 100.0 },
			formats: &["image/png", "image/jpeg"],
		}
	}

	#[test]
	fn wms_capabilities_names_every_layer() {
		let xml = wms_capabilities(&[layer()]);
		assert!(xml.starts_with("<?xml"));
		assert!(xml.contains("<Name>ortho</Name>"));
		assert!(xml.contains("<CRS>EPSG:3857</CRS>"));
		assert!(xml.ends_with("</WMS_Capabilities>"));
	}

	#[test]
	fn wmts_capabilities_links_the_tile_matrix_set() {
		let xml = wmts_capabilities(&[layer()], "WebMercator");
		assert!(xml.contains("<ows:Identifier>ortho</ows:Identifier>"));
		assert!(xml.contains("<TileMatrixSet>WebMercator</TileMatrixSet>"));
		assert!(xml.ends_with("</Capabilities>"));
	}

	#[test]
	fn layer_title_is_escaped() {
		let mut l = layer();
		l.title = "A & B";
		let xml = wms_capabilities(&[l]);
		assert!(xml.contains("<Title>A &amp; B</Title>"));
	}
}
