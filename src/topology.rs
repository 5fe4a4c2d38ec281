//! TopoJSON decoding.
//!
//! Arcs are decoded once (delta decoding plus the quantization transform when
//! the topology carries one) and then stitched into rings for the county
//! polygons or kept as separate lines for the state border mesh.

use crate::error::{DataError, DataResult};
use crate::types::{County, StateMesh};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub transform: Option<Transform>,
    pub arcs: Vec<Vec<Vec<f64>>>,
    pub objects: HashMap<String, TopoGeometry>,
}

/// Everything the map draws from a topology.
#[derive(Debug, Clone)]
pub struct MapGeometry {
    pub counties: Vec<County>,
    pub mesh: StateMesh,
    pub nation: Option<MultiPolygon<f64>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Transform {
    pub scale: [f64; 2],
    pub translate: [f64; 2],
}

/// One TopoJSON geometry object. Kept loose so that null geometries and
/// types we don't draw don't reject the whole file.
#[derive(Debug, Clone, Deserialize)]
pub struct TopoGeometry {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub arcs: Value,
    #[serde(default)]
    pub geometries: Vec<TopoGeometry>,
}

type ArcRing = Vec<i64>;
type ArcPolygon = Vec<ArcRing>;

impl TopoGeometry {
    /// Leaf geometries, with collections expanded.
    fn leaves(&self) -> Vec<&TopoGeometry> {
        match self.kind.as_deref() {
            Some("GeometryCollection") => self.geometries.iter().flat_map(|g| g.leaves()).collect(),
            _ => vec![self],
        }
    }

    /// Arc indices of each polygon; empty for non-areal geometries.
    fn polygons(&self) -> DataResult<Vec<ArcPolygon>> {
        let polygons = match self.kind.as_deref() {
            Some("Polygon") => vec![serde_json::from_value::<ArcPolygon>(self.arcs.clone())?],
            Some("MultiPolygon") => serde_json::from_value::<Vec<ArcPolygon>>(self.arcs.clone())?,
            _ => Vec::new(),
        };
        Ok(polygons)
    }

    fn fips(&self) -> Option<u32> {
        match self.id.as_ref()? {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

fn arc_slot(index: i64) -> (usize, bool) {
    if index < 0 {
        ((!index) as usize, true)
    } else {
        (index as usize, false)
    }
}

impl Topology {
    pub fn from_slice(bytes: &[u8]) -> DataResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn object(&self, name: &str) -> DataResult<&TopoGeometry> {
        self.objects
            .get(name)
            .ok_or_else(|| DataError::Topology(format!("missing object '{}'", name)))
    }

    fn decode_arcs(&self) -> Vec<Vec<Coord<f64>>> {
        self.arcs
            .iter()
            .map(|arc| {
                let (mut x, mut y) = (0.0, 0.0);
                arc.iter()
                    .filter(|position| position.len() >= 2)
                    .map(|position| match &self.transform {
                        Some(t) => {
                            x += position[0];
                            y += position[1];
                            Coord {
                                x: x * t.scale[0] + t.translate[0],
                                y: y * t.scale[1] + t.translate[1],
                            }
                        }
                        None => Coord { x: position[0], y: position[1] },
                    })
                    .collect()
            })
            .collect()
    }

    pub fn decode(&self) -> DataResult<MapGeometry> {
        Ok(MapGeometry {
            counties: self.counties()?,
            mesh: self.state_mesh()?,
            nation: self.nation_outline()?,
        })
    }

    /// Every county with areal geometry and a numeric id.
    pub fn counties(&self) -> DataResult<Vec<County>> {
        let object = self.object("counties")?;
        let arcs = self.decode_arcs();

        let mut counties = Vec::new();
        for geometry in object.leaves() {
            let polygons = geometry.polygons()?;
            if polygons.is_empty() {
                continue;
            }
            let Some(fips) = geometry.fips() else {
                debug!(id = ?geometry.id, "skipping county geometry without numeric id");
                continue;
            };
            counties.push(County {
                fips,
                geometry: to_multipolygon(&arcs, &polygons)?,
            });
        }
        Ok(counties)
    }

    /// Arcs of the `states` object referenced by two different states. Empty
    /// when the topology has no `states` object.
    pub fn state_mesh(&self) -> DataResult<StateMesh> {
        let Some(object) = self.objects.get("states") else {
            debug!("topology has no states object, drawing no borders");
            return Ok(StateMesh::new(Vec::new()));
        };
        let arcs = self.decode_arcs();

        let mut geometries_by_arc: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (geometry_index, geometry) in object.leaves().into_iter().enumerate() {
            for polygon in geometry.polygons()? {
                for &index in polygon.iter().flatten() {
                    let owners = geometries_by_arc.entry(arc_slot(index).0).or_default();
                    if owners.last() != Some(&geometry_index) {
                        owners.push(geometry_index);
                    }
                }
            }
        }

        let mut lines = Vec::new();
        for (arc, owners) in geometries_by_arc {
            if owners.first() == owners.last() {
                continue;
            }
            let points = arcs
                .get(arc)
                .ok_or_else(|| DataError::Topology(format!("arc index {} out of range", arc)))?;
            lines.push(LineString::new(points.clone()));
        }
        Ok(StateMesh::new(lines))
    }

    /// Outline of the `nation` object, when the topology has one.
    pub fn nation_outline(&self) -> DataResult<Option<MultiPolygon<f64>>> {
        let Some(object) = self.objects.get("nation") else {
            return Ok(None);
        };
        let arcs = self.decode_arcs();
        let mut polygons = Vec::new();
        for geometry in object.leaves() {
            polygons.extend(geometry.polygons()?);
        }
        Ok(Some(to_multipolygon(&arcs, &polygons)?))
    }
}

fn to_multipolygon(arcs: &[Vec<Coord<f64>>], polygons: &[ArcPolygon]) -> DataResult<MultiPolygon<f64>> {
    let mut result = Vec::with_capacity(polygons.len());
    for rings in polygons {
        let mut rings = rings
            .iter()
            .map(|ring| stitch(arcs, ring).map(LineString::new))
            .collect::<DataResult<Vec<_>>>()?;
        if rings.is_empty() {
            continue;
        }
        let exterior = rings.remove(0);
        result.push(Polygon::new(exterior, rings));
    }
    Ok(MultiPolygon::new(result))
}

fn stitch(arcs: &[Vec<Coord<f64>>], ring: &[i64]) -> DataResult<Vec<Coord<f64>>> {
    let mut points: Vec<Coord<f64>> = Vec::new();
    for &index in ring {
        let (slot, reversed) = arc_slot(index);
        let arc = arcs
            .get(slot)
            .ok_or_else(|| DataError::Topology(format!("arc index {} out of range", index)))?;
        // Consecutive arcs share their joining point.
        points.pop();
        if reversed {
            points.extend(arc.iter().rev());
        } else {
            points.extend(arc.iter());
        }
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;

    const BUNDLED: &str = include_str!("../data/counties.json");

    #[test]
    fn decodes_quantized_delta_arcs() {
        let topology = Topology::from_slice(
            br#"{
                "type": "Topology",
                "transform": {"scale": [2, 3], "translate": [10, 20]},
                "arcs": [[[1, 1], [2, 0], [0, 2]]],
                "objects": {}
            }"#,
        )
        .unwrap();
        let arcs = topology.decode_arcs();
        assert_eq!(
            arcs[0],
            vec![
                Coord { x: 12.0, y: 23.0 },
                Coord { x: 16.0, y: 23.0 },
                Coord { x: 16.0, y: 29.0 },
            ]
        );
    }

    #[test]
    fn untransformed_arcs_are_absolute() {
        let topology = Topology::from_slice(
            br#"{"type": "Topology", "arcs": [[[5, 5], [7, 9]]], "objects": {}}"#,
        )
        .unwrap();
        assert_eq!(topology.decode_arcs()[0][1], Coord { x: 7.0, y: 9.0 });
    }

    #[test]
    fn stitches_reversed_arcs_without_duplicate_joins() {
        let arcs = vec![
            vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 0.0 }],
            vec![Coord { x: 0.0, y: 1.0 }, Coord { x: 1.0, y: 0.0 }],
            vec![Coord { x: 0.0, y: 1.0 }, Coord { x: 0.0, y: 0.0 }],
        ];
        let ring = stitch(&arcs, &[0, -2, 2]).unwrap();
        assert_eq!(
            ring,
            vec![
                Coord { x: 0.0, y: 0.0 },
                Coord { x: 1.0, y: 0.0 },
                Coord { x: 0.0, y: 1.0 },
                Coord { x: 0.0, y: 0.0 },
            ]
        );
    }

    #[test]
    fn out_of_range_arc_is_an_error() {
        let arcs = vec![vec![Coord { x: 0.0, y: 0.0 }]];
        assert!(matches!(stitch(&arcs, &[3]), Err(DataError::Topology(_))));
    }

    #[test]
    fn bundled_counties_decode_with_ids_and_area() {
        let topology = Topology::from_slice(BUNDLED.as_bytes()).unwrap();
        let counties = topology.counties().unwrap();
        let ids: Vec<u32> = counties.iter().map(|c| c.fips).collect();
        assert_eq!(ids, vec![1001, 1003, 2013, 2016]);
        for county in &counties {
            assert!((county.geometry.unsigned_area() - 20_000.0).abs() < 1e-6);
        }
    }

    #[test]
    fn mesh_keeps_only_borders_between_states() {
        let topology = Topology::from_slice(BUNDLED.as_bytes()).unwrap();
        let mesh = topology.state_mesh().unwrap();
        assert_eq!(mesh.0.len(), 1);
        let xs: Vec<f64> = mesh.0[0].coords().map(|c| c.x).collect();
        assert!(xs.iter().all(|&x| (x - 480.0).abs() < 1e-9));
    }

    #[test]
    fn nation_outline_is_optional() {
        let topology = Topology::from_slice(BUNDLED.as_bytes()).unwrap();
        let nation = topology.nation_outline().unwrap().unwrap();
        assert!((nation.unsigned_area() - 80_000.0).abs() < 1e-6);

        let bare = Topology::from_slice(br#"{"arcs": [], "objects": {}}"#).unwrap();
        assert!(bare.nation_outline().unwrap().is_none());
    }

    #[test]
    fn null_and_string_ids() {
        let topology = Topology::from_slice(
            br#"{
                "arcs": [[[0, 0], [1, 0], [1, 1], [0, 0]]],
                "objects": {"counties": {"type": "GeometryCollection", "geometries": [
                    {"type": null, "id": 1},
                    {"type": "Polygon", "id": "06037", "arcs": [[0]]},
                    {"type": "Polygon", "arcs": [[0]]}
                ]}}
            }"#,
        )
        .unwrap();
        let counties = topology.counties().unwrap();
        assert_eq!(counties.len(), 1);
        assert_eq!(counties[0].fips, 6037);
    }

    #[test]
    fn states_object_is_optional() {
        let topology = Topology::from_slice(
            br#"{
                "arcs": [[[0, 0], [1, 0], [1, 1], [0, 0]]],
                "objects": {"counties": {"type": "Polygon", "id": 1001, "arcs": [[0]]}}
            }"#,
        )
        .unwrap();
        let geometry = topology.decode().unwrap();
        assert_eq!(geometry.counties.len(), 1);
        assert!(geometry.mesh.0.is_empty());
        assert!(geometry.nation.is_none());
    }

    #[test]
    fn missing_counties_object_is_an_error() {
        let topology = Topology::from_slice(br#"{"arcs": [], "objects": {}}"#).unwrap();
        assert!(matches!(topology.counties(), Err(DataError::Topology(_))));
    }
}
