/// SVG gradient exchange format
///
/// Reads `<linearGradient>`/`<radialGradient>` elements and writes a bare
/// `<linearGradient>`. The stop role is carried in a vendor attribute
/// `krita:stop-type`. Writing always produces a linear gradient with
/// bounding-box units and no geometry attributes, so radial geometry does
/// not survive a save.

use std::fmt::Write as _;
use std::str::FromStr;

use cgmath::Point2;
use log::warn;
use roxmltree::{Document, Node};
use svgtypes::{Length, LengthUnit};

use super::ramp::{
    GradientGeometry, GradientKind, GradientRamp, GradientStop, GradientUnits, SpreadMethod, StopKind,
};
use crate::color::Color;
use crate::error::{GradientError, GradientResult};

pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
/// Namespace of the `stop-type` extension attribute
pub const VENDOR_NAMESPACE: &str = "http://krita.org/namespaces/svg/krita";
pub const VENDOR_PREFIX: &str = "krita";

impl GradientRamp {
    /// Parse the first gradient element found in `text`
    pub fn from_svg(text: &str) -> GradientResult<Self> {
        let mut ramp = GradientRamp::new("");
        ramp.load_svg(text)?;
        Ok(ramp)
    }

    /// Replace this ramp's contents with the gradient in `text`
    ///
    /// When a stop cannot be read the stops parsed before it are kept and
    /// the error is returned.
    pub fn load_svg(&mut self, text: &str) -> GradientResult<()> {
        let document = Document::parse(text)?;
        let element = document
            .descendants()
            .find(|n| n.is_element() && matches!(n.tag_name().name(), "linearGradient" | "radialGradient"))
            .ok_or(GradientError::NoGradientElement)?;

        if let Some(id) = element.attribute("id") {
            self.set_name(id);
        }
        self.geometry = parse_geometry(element);
        self.spread = match element.attribute("spreadMethod").map(str::trim) {
            Some("reflect") => SpreadMethod::Reflect,
            Some("repeat") => SpreadMethod::Repeat,
            _ => SpreadMethod::Pad,
        };

        let mut stops: Vec<GradientStop> = Vec::new();
        let mut failure = None;

        for (index, node) in element.children().filter(|n| n.has_tag_name("stop")).enumerate() {
            match parse_stop(node) {
                Ok(mut stop) => {
                    // Offsets never go backwards
                    if let Some(previous) = stops.last() {
                        if stop.position < previous.position {
                            stop.position = previous.position;
                        }
                    }
                    stops.push(stop);
                }
                Err(reason) => {
                    warn!("⚠️  Gradient '{}': stop {} skipped: {}", self.name(), index, reason);
                    failure = Some(GradientError::InvalidStop { index, reason });
                    break;
                }
            }
        }

        self.set_stops(stops);
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// `<linearGradient>` element declaring its own namespaces
    pub fn to_svg_element(&self) -> String {
        let mut out = String::new();
        self.write_gradient(&mut out, true);
        out
    }

    /// Standalone SVG document holding the gradient
    pub fn to_svg_document(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            r#"<svg xmlns="{SVG_NAMESPACE}" xmlns:{VENDOR_PREFIX}="{VENDOR_NAMESPACE}">"#
        );
        self.write_gradient(&mut out, false);
        out.push_str("</svg>\n");
        out
    }

    fn write_gradient(&self, out: &mut String, declare_namespaces: bool) {
        out.push_str("<linearGradient");
        if declare_namespaces {
            let _ = write!(
                out,
                r#" xmlns="{SVG_NAMESPACE}" xmlns:{VENDOR_PREFIX}="{VENDOR_NAMESPACE}""#
            );
        }
        let _ = writeln!(
            out,
            r#" id="{}" gradientUnits="objectBoundingBox" spreadMethod="{}">"#,
            escape(self.name()),
            self.spread.as_str()
        );

        for stop in self.stops() {
            let _ = writeln!(
                out,
                r#"  <stop stop-color="{}" offset="{}" stop-opacity="{}" {}:stop-type="{}"/>"#,
                stop.color.to_hex(),
                stop.position,
                stop.color.opacity(),
                VENDOR_PREFIX,
                stop.kind.as_str()
            );
        }
        out.push_str("</linearGradient>\n");
    }
}

fn parse_geometry(element: Node) -> GradientGeometry {
    let units = match element.attribute("gradientUnits").map(str::trim) {
        Some("userSpaceOnUse") => GradientUnits::UserSpaceOnUse,
        _ => GradientUnits::ObjectBoundingBox,
    };
    let coord = |name: &str, default: f64| {
        element
            .attribute(name)
            .and_then(parse_fraction)
            .unwrap_or(default)
    };

    if element.tag_name().name() == "radialGradient" {
        let cx = coord("cx", 0.5);
        let cy = coord("cy", 0.5);
        let r = coord("r", 0.5);
        GradientGeometry {
            kind: GradientKind::Radial,
            units,
            start: Point2::new(cx, cy),
            end: Point2::new(cx + r, cy),
            focal: Point2::new(coord("fx", cx), coord("fy", cy)),
        }
    } else {
        let start = Point2::new(coord("x1", 0.0), coord("y1", 0.0));
        GradientGeometry {
            kind: GradientKind::Linear,
            units,
            start,
            end: Point2::new(coord("x2", 1.0), coord("y2", 0.0)),
            focal: start,
        }
    }
}

/// Number or percentage, as a fraction
fn parse_fraction(text: &str) -> Option<f64> {
    let length = Length::from_str(text.trim()).ok()?;
    Some(match length.unit {
        LengthUnit::Percent => length.number / 100.0,
        _ => length.number,
    })
}

/// `key: value` lookup in an inline `style` attribute
fn style_property<'a>(style: &'a str, key: &str) -> Option<&'a str> {
    style
        .split(';')
        .filter_map(|declaration| declaration.split_once(':'))
        .find(|(name, _)| name.trim() == key)
        .map(|(_, value)| value.trim())
}

fn parse_stop(node: Node) -> Result<GradientStop, String> {
    let style = node.attribute("style").unwrap_or("");

    let position = match node.attribute("offset") {
        Some(offset) => parse_fraction(offset).ok_or_else(|| format!("bad offset '{offset}'"))?,
        None => 0.0,
    };

    let color = match node
        .attribute("stop-color")
        .or_else(|| style_property(style, "stop-color"))
    {
        Some(text) => Color::parse(text).ok_or_else(|| format!("bad stop-color '{text}'"))?,
        None => Color::BLACK,
    };

    let opacity = match node
        .attribute("stop-opacity")
        .or_else(|| style_property(style, "stop-opacity"))
    {
        Some(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("bad stop-opacity '{text}'"))?,
        None => 1.0,
    };

    let kind = node
        .attribute((VENDOR_NAMESPACE, "stop-type"))
        .or_else(|| {
            node.attributes()
                .find(|a| a.name() == "stop-type")
                .map(|a| a.value())
        })
        .map(StopKind::from_marker)
        .unwrap_or_default();

    Ok(GradientStop {
        position,
        color: color.with_opacity(color.opacity() * opacity),
        kind,
    })
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stops_of(ramp: &GradientRamp) -> Vec<(f64, Color, StopKind)> {
        ramp.stops().iter().map(|s| (s.position, s.color, s.kind)).collect()
    }

    #[test]
    fn test_round_trip_three_stops() {
        let original = GradientRamp::with_stops(
            "Sunset & Sea",
            vec![
                GradientStop::new(0.0, Color::rgba(255, 0, 0, 255)),
                GradientStop::foreground(0.3, Color::rgba(0, 128, 0, 128)),
                GradientStop::new(1.0, Color::rgba(10, 20, 250, 51)),
            ],
        );

        let once = GradientRamp::from_svg(&original.to_svg_element()).unwrap();
        let twice = GradientRamp::from_svg(&once.to_svg_document()).unwrap();

        assert_eq!(twice.name(), "Sunset & Sea");
        assert_eq!(twice.stops().len(), 3);
        for (parsed, expected) in twice.stops().iter().zip(original.stops()) {
            assert!((parsed.position - expected.position).abs() < 1e-6);
            assert_eq!(parsed.color.to_hex(), expected.color.to_hex());
            assert!((parsed.color.opacity() - expected.color.opacity()).abs() <= 1.0 / 255.0);
            assert_eq!(parsed.kind, expected.kind);
        }
    }

    #[test]
    fn test_regressing_offsets_are_clamped_up() {
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg">
            <linearGradient id="g">
                <stop offset="0" stop-color="#000000"/>
                <stop offset="0.8" stop-color="#ff0000"/>
                <stop offset="0.5" stop-color="#00ff00"/>
                <stop offset="1" stop-color="#ffffff"/>
            </linearGradient></svg>"##;
        let ramp = GradientRamp::from_svg(svg).unwrap();
        let positions: Vec<f64> = ramp.stops().iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0.0, 0.8, 0.8, 1.0]);
        assert_eq!(ramp.stops()[2].color, Color::rgb(0, 255, 0));
    }

    #[test]
    fn test_style_and_attribute_precedence() {
        let svg = r##"<linearGradient xmlns="http://www.w3.org/2000/svg">
            <stop offset="25%" stop-color="#0000ff" style="stop-color:#ff0000; stop-opacity:0.5"/>
            <stop offset="75%" style="stop-color: #00ff00"/>
        </linearGradient>"##;
        let ramp = GradientRamp::from_svg(svg).unwrap();
        assert_eq!(
            stops_of(&ramp),
            vec![
                (0.25, Color::rgba(0, 0, 255, 128), StopKind::Color),
                (0.75, Color::rgb(0, 255, 0), StopKind::Color),
            ]
        );
    }

    #[test]
    fn test_stop_type_marker() {
        let svg = r##"<linearGradient xmlns="http://www.w3.org/2000/svg"
                xmlns:krita="http://krita.org/namespaces/svg/krita">
            <stop offset="0" stop-color="black" krita:stop-type="background-stop"/>
            <stop offset="1" stop-color="white" krita:stop-type="something-else"/>
        </linearGradient>"##;
        let ramp = GradientRamp::from_svg(svg).unwrap();
        assert_eq!(ramp.stops()[0].kind, StopKind::Background);
        assert_eq!(ramp.stops()[1].kind, StopKind::Color);
        assert!(ramp.has_variable_stops());
    }

    #[test]
    fn test_radial_geometry_and_spread() {
        let svg = r##"<radialGradient xmlns="http://www.w3.org/2000/svg" id="r"
                gradientUnits="userSpaceOnUse" cx="50" cy="40" r="10" fx="45" spreadMethod="reflect">
            <stop offset="0" stop-color="black"/>
        </radialGradient>"##;
        let ramp = GradientRamp::from_svg(svg).unwrap();
        assert_eq!(ramp.geometry.kind, GradientKind::Radial);
        assert_eq!(ramp.geometry.units, GradientUnits::UserSpaceOnUse);
        assert_eq!(ramp.geometry.start, Point2::new(50.0, 40.0));
        assert_eq!(ramp.geometry.end, Point2::new(60.0, 40.0));
        assert_eq!(ramp.geometry.focal, Point2::new(45.0, 40.0));
        assert_eq!(ramp.spread, SpreadMethod::Reflect);

        // Saving is always linear
        assert!(ramp.to_svg_element().starts_with("<linearGradient"));
    }

    #[test]
    fn test_linear_defaults() {
        let ramp = GradientRamp::from_svg(r#"<linearGradient x2="50%"/>"#).unwrap();
        assert_eq!(ramp.geometry.units, GradientUnits::ObjectBoundingBox);
        assert_eq!(ramp.geometry.start, Point2::new(0.0, 0.0));
        assert_eq!(ramp.geometry.end, Point2::new(0.5, 0.0));
        assert_eq!(ramp.spread, SpreadMethod::Pad);
        assert!(ramp.is_empty());
    }

    #[test]
    fn test_bad_stop_keeps_earlier_stops() {
        let svg = r##"<linearGradient id="partial">
            <stop offset="0" stop-color="#112233"/>
            <stop offset="0.5" stop-color="not-a-color"/>
            <stop offset="1" stop-color="#ffffff"/>
        </linearGradient>"##;

        let mut ramp = GradientRamp::new("");
        let err = ramp.load_svg(svg).unwrap_err();
        assert!(matches!(err, GradientError::InvalidStop { index: 1, .. }));
        assert_eq!(ramp.name(), "partial");
        assert_eq!(stops_of(&ramp), vec![(0.0, Color::rgb(0x11, 0x22, 0x33), StopKind::Color)]);
    }

    #[test]
    fn test_documents_without_gradients_are_rejected() {
        assert!(matches!(
            GradientRamp::from_svg("<svg/>"),
            Err(GradientError::NoGradientElement)
        ));
        assert!(matches!(
            GradientRamp::from_svg("<svg"),
            Err(GradientError::Xml(_))
        ));
    }
}
