//! GeoJSON reading and writing (RFC 7946 subset)
//!
//! Only the geometry types basin boundaries and command areas need are
//! handled: points, lines and polygons plus their multi variants.

use super::{AttributeValue, Feature, FeatureCollection};
use crate::crs::CRS;
use crate::error::{Error, Result};
use geo_types::{
    Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

/// Read a GeoJSON file. Returns the features and the declared CRS, if any.
pub fn read_feature_collection<P: AsRef<Path>>(path: P) -> Result<(FeatureCollection, Option<CRS>)> {
    let text = fs::read_to_string(path.as_ref())?;
    parse_feature_collection(&text)
}

/// Parse GeoJSON text holding a FeatureCollection, a Feature or a bare geometry
pub fn parse_feature_collection(text: &str) -> Result<(FeatureCollection, Option<CRS>)> {
    let root: Value = serde_json::from_str(text)?;
    let crs = root
        .pointer("/crs/properties/name")
        .and_then(Value::as_str)
        .map(CRS::from_name);

    let collection = match type_of(&root)? {
        "FeatureCollection" => {
            let features = root
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::parse("FeatureCollection", "missing 'features' array"))?;
            features
                .iter()
                .map(parse_feature)
                .collect::<Result<FeatureCollection>>()?
        }
        "Feature" => std::iter::once(parse_feature(&root)?).collect(),
        _ => std::iter::once(Feature::new(parse_geometry(&root)?)).collect(),
    };

    Ok((collection, crs))
}

fn type_of(value: &Value) -> Result<&str> {
    value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::parse("GeoJSON", "object without 'type'"))
}

fn parse_feature(value: &Value) -> Result<Feature> {
    if type_of(value)? != "Feature" {
        return Err(Error::parse("FeatureCollection", "member is not a Feature"));
    }

    let mut feature = match value.get("geometry") {
        None | Some(Value::Null) => Feature::empty(),
        Some(g) => Feature::new(parse_geometry(g)?),
    };

    feature.id = match value.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    if let Some(Value::Object(props)) = value.get("properties") {
        for (key, v) in props {
            feature.set_property(key.clone(), attribute_from_json(v));
        }
    }

    Ok(feature)
}

fn attribute_from_json(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => AttributeValue::String(s.clone()),
        other => AttributeValue::String(other.to_string()),
    }
}

fn parse_geometry(value: &Value) -> Result<Geometry<f64>> {
    let kind = type_of(value)?;
    let coords = || {
        value
            .get("coordinates")
            .ok_or_else(|| Error::InvalidGeometry(format!("{} without coordinates", kind)))
    };

    let geometry = match kind {
        "Point" => Geometry::Point(Point::from(coord(coords()?)?)),
        "MultiPoint" => Geometry::MultiPoint(MultiPoint::new(
            array(coords()?)?
                .iter()
                .map(|c| coord(c).map(Point::from))
                .collect::<Result<_>>()?,
        )),
        "LineString" => Geometry::LineString(line_string(coords()?)?),
        "MultiLineString" => Geometry::MultiLineString(MultiLineString::new(
            array(coords()?)?
                .iter()
                .map(line_string)
                .collect::<Result<_>>()?,
        )),
        "Polygon" => Geometry::Polygon(polygon(coords()?)?),
        "MultiPolygon" => Geometry::MultiPolygon(MultiPolygon::new(
            array(coords()?)?
                .iter()
                .map(polygon)
                .collect::<Result<_>>()?,
        )),
        other => {
            return Err(Error::InvalidGeometry(format!(
                "unsupported geometry type '{}'",
                other
            )))
        }
    };

    Ok(geometry)
}

fn array(value: &Value) -> Result<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| Error::InvalidGeometry("coordinates must be an array".into()))
}

fn coord(value: &Value) -> Result<Coord<f64>> {
    let pos = array(value)?;
    let x = pos.first().and_then(Value::as_f64);
    let y = pos.get(1).and_then(Value::as_f64);
    match (x, y) {
        (Some(x), Some(y)) => Ok(Coord { x, y }),
        _ => Err(Error::InvalidGeometry(format!("invalid position {}", value))),
    }
}

fn line_string(value: &Value) -> Result<LineString<f64>> {
    Ok(LineString::new(
        array(value)?.iter().map(coord).collect::<Result<_>>()?,
    ))
}

fn polygon(value: &Value) -> Result<Polygon<f64>> {
    let mut rings = array(value)?
        .iter()
        .map(line_string)
        .collect::<Result<Vec<_>>>()?;
    if rings.is_empty() {
        return Err(Error::InvalidGeometry("polygon without rings".into()));
    }
    let exterior = rings.remove(0);
    if exterior.0.len() < 4 {
        return Err(Error::InvalidGeometry(
            "polygon ring needs at least four positions".into(),
        ));
    }
    Ok(Polygon::new(exterior, rings))
}

fn position(c: &Coord<f64>) -> Value {
    json!([c.x, c.y])
}

fn ring(ls: &LineString<f64>) -> Value {
    Value::Array(ls.0.iter().map(position).collect())
}

fn polygon_rings(p: &Polygon<f64>) -> Value {
    let mut rings = vec![ring(p.exterior())];
    rings.extend(p.interiors().iter().map(ring));
    Value::Array(rings)
}

/// GeoJSON geometry object, or `None` for types GeoJSON cannot express
pub fn geometry_to_value(geometry: &Geometry<f64>) -> Option<Value> {
    let value = match geometry {
        Geometry::Point(p) => json!({"type": "Point", "coordinates": position(&p.0)}),
        Geometry::MultiPoint(mp) => json!({
            "type": "MultiPoint",
            "coordinates": mp.0.iter().map(|p| position(&p.0)).collect::<Vec<_>>(),
        }),
        Geometry::LineString(ls) => json!({"type": "LineString", "coordinates": ring(ls)}),
        Geometry::MultiLineString(mls) => json!({
            "type": "MultiLineString",
            "coordinates": mls.0.iter().map(ring).collect::<Vec<_>>(),
        }),
        Geometry::Polygon(p) => json!({"type": "Polygon", "coordinates": polygon_rings(p)}),
        Geometry::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.0.iter().map(polygon_rings).collect::<Vec<_>>(),
        }),
        Geometry::Rect(r) => {
            json!({"type": "Polygon", "coordinates": polygon_rings(&r.to_polygon())})
        }
        _ => return None,
    };
    Some(value)
}

/// Serialize a collection to a GeoJSON `Value`
pub fn to_geojson_value(collection: &FeatureCollection, crs: Option<&CRS>) -> Result<Value> {
    let features = collection
        .iter()
        .map(|f| -> Result<Value> {
            let mut obj = Map::new();
            obj.insert("type".into(), json!("Feature"));
            if let Some(id) = &f.id {
                obj.insert("id".into(), json!(id));
            }
            obj.insert(
                "properties".into(),
                serde_json::to_value(&f.properties)?,
            );
            obj.insert(
                "geometry".into(),
                f.geometry
                    .as_ref()
                    .and_then(geometry_to_value)
                    .unwrap_or(Value::Null),
            );
            Ok(Value::Object(obj))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut root = json!({"type": "FeatureCollection", "features": features});
    if let Some(urn) = crs.and_then(CRS::urn) {
        root["crs"] = json!({"type": "name", "properties": {"name": urn}});
    }
    Ok(root)
}

/// Write a collection to a GeoJSON file
pub fn write_feature_collection<P: AsRef<Path>>(
    path: P,
    collection: &FeatureCollection,
    crs: Option<&CRS>,
) -> Result<()> {
    let text = serde_json::to_string_pretty(&to_geojson_value(collection, crs)?)?;
    fs::write(path.as_ref(), text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;

    const BASIN: &str = r#"{
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32637"}},
        "features": [{
            "type": "Feature",
            "id": 7,
            "properties": {"name": "Awash", "area_km2": 110000.5, "gauges": 12},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]],[[2,2],[4,2],[4,4],[2,2]]]
            }
        }]
    }"#;

    #[test]
    fn test_parse_collection_with_crs_and_hole() {
        let (fc, crs) = parse_feature_collection(BASIN).unwrap();
        assert_eq!(crs.and_then(|c| c.epsg()), Some(32637));
        assert_eq!(fc.len(), 1);

        let feature = &fc.features[0];
        assert_eq!(feature.id.as_deref(), Some("7"));
        assert_eq!(feature.get_property("gauges"), Some(&AttributeValue::Int(12)));
        assert_eq!(
            feature.get_property("name"),
            Some(&AttributeValue::String("Awash".into()))
        );

        let polys = fc.polygons();
        assert_eq!(polys.len(), 1);
        assert_eq!(polys[0].interiors().len(), 1);
    }

    #[test]
    fn test_bare_geometry_and_unsupported_type() {
        let (fc, crs) =
            parse_feature_collection(r#"{"type":"Point","coordinates":[80.69,6.25]}"#).unwrap();
        assert!(crs.is_none());
        assert!(matches!(fc.features[0].geometry, Some(Geometry::Point(_))));

        let err = parse_feature_collection(r#"{"type":"GeometryCollection","geometries":[]}"#);
        assert!(matches!(err, Err(Error::InvalidGeometry(_))));
    }

    #[test]
    fn test_written_collection_parses_back() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
        let fc: FeatureCollection = std::iter::once(
            Feature::new(square).with_property("type", "default").with_property("value", 1i64),
        )
        .collect();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("area.geojson");
        write_feature_collection(&path, &fc, Some(&CRS::wgs84())).unwrap();

        let (back, crs) = read_feature_collection(&path).unwrap();
        assert_eq!(crs.and_then(|c| c.epsg()), Some(4326));
        assert_eq!(back, fc);
    }

    #[test]
    fn test_geojson_value_keeps_properties() {
        let point = geo_types::Point::new(38.5, 9.0);
        let fc: FeatureCollection = std::iter::once(
            Feature::new(point)
                .with_property("name", "Koka")
                .with_property("capacity", 1.85)
                .with_property("missing", AttributeValue::Null),
        )
        .collect();

        let value = to_geojson_value(&fc, None).unwrap();
        assert!(value.get("crs").is_none());
        let properties = &value["features"][0]["properties"];
        assert_eq!(properties["name"], "Koka");
        assert_eq!(properties["capacity"].as_f64(), Some(1.85));
        assert!(properties["missing"].is_null());
        assert_eq!(value["features"][0]["geometry"]["type"], "Point");
    }
}
