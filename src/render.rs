use crate::config::{AppConfig, RenderConfig};
use crate::data::{Datasets, EducationIndex};
use crate::error::DataResult;
use crate::legend::Legend;
use crate::projection::{self, Projection};
use crate::scale::ThresholdScale;
use crate::tooltip;
use crate::topology::MapGeometry;
use crate::types::{County, EducationRecord, StateMesh};
use anyhow::{Context, Result};
use geo::MultiPolygon;
use geojson::{feature::Id, Feature, FeatureCollection, Geometry, JsonObject};
use rayon::prelude::*;
use serde_json::json;
use std::fmt::Write;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

const PAGE_TEMPLATE: &str = include_str!("../templates/choropleth.html");

/// A county path as drawn: projected geometry, path data and fill.
#[derive(Debug, Clone)]
pub struct CountyShape {
    pub fips: u32,
    pub projected: MultiPolygon<f64>,
    pub d: String,
    pub fill: String,
    pub record: Option<EducationRecord>,
}

#[derive(Debug, Clone)]
pub enum Element {
    County(CountyShape),
    StateBorders { d: String },
    Nation { d: String },
}

/// The drawing surface. Drawing always starts from an empty surface.
#[derive(Debug, Clone, Default)]
pub struct Surface {
    elements: Vec<Element>,
    legend: Option<Legend>,
    width: f64,
    height: f64,
}

impl Surface {
    pub fn clear(&mut self) {
        self.elements.clear();
        self.legend = None;
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn counties(&self) -> impl Iterator<Item = &CountyShape> {
        self.elements.iter().filter_map(|e| match e {
            Element::County(shape) => Some(shape),
            _ => None,
        })
    }

    pub fn legend(&self) -> Option<&Legend> {
        self.legend.as_ref()
    }

    pub fn to_svg(&self) -> String {
        let mut svg = format!(
            r##"<svg id="map" width="{w:.0}" height="{h:.0}" viewBox="0 0 {w:.0} {h:.0}"><g class="counties">"##,
            w = self.width,
            h = self.height
        );
        for shape in self.counties() {
            let education = shape
                .record
                .as_ref()
                .map(|r| r.bachelors_or_higher.to_string())
                .unwrap_or_default();
            let (name, state) = shape
                .record
                .as_ref()
                .map(|r| (escape(&r.area_name), escape(&r.state)))
                .unwrap_or_default();
            let _ = write!(
                svg,
                r##"<path class="county" data-fips="{}" data-education="{}" data-name="{}" data-state="{}" fill="{}" d="{}"/>"##,
                shape.fips, education, name, state, shape.fill, shape.d
            );
        }
        svg.push_str("</g>");
        for element in &self.elements {
            match element {
                Element::StateBorders { d } => {
                    let _ = write!(
                        svg,
                        r##"<path class="states" fill="none" stroke="#ffffff" stroke-linejoin="round" d="{}"/>"##,
                        d
                    );
                }
                Element::Nation { d } => {
                    let _ = write!(
                        svg,
                        r##"<path class="nation" fill="none" stroke="#555555" stroke-width="0.5" d="{}"/>"##,
                        d
                    );
                }
                Element::County(_) => {}
            }
        }
        svg.push_str("</svg>");
        svg
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawSummary {
    pub counties: usize,
    pub missing: Vec<u32>,
}

/// Decoded map data plus the scale derived from it.
pub struct Choropleth {
    pub counties: Vec<County>,
    pub mesh: StateMesh,
    pub nation: Option<MultiPolygon<f64>>,
    pub education: EducationIndex,
    pub scale: ThresholdScale,
    pub legend: Legend,
    config: RenderConfig,
    projection: Box<dyn Projection>,
}

impl Choropleth {
    pub fn new(datasets: &Datasets, config: &RenderConfig) -> DataResult<Self> {
        let MapGeometry { counties, mesh, nation } = datasets.topology.decode()?;

        let education = EducationIndex::new(datasets.education.clone());
        let scale = ThresholdScale::from_values(education.percentages(), &config.palette);
        let legend = Legend::new(&scale);
        info!(
            counties = counties.len(),
            records = education.len(),
            domain = ?scale.domain(),
            "Choropleth prepared"
        );

        Ok(Self {
            counties,
            mesh,
            nation,
            education,
            scale,
            legend,
            config: config.clone(),
            projection: projection::from_kind(config.projection),
        })
    }

    pub fn fill_for(&self, record: Option<&EducationRecord>) -> &str {
        match record {
            Some(r) => self.scale.color(r.bachelors_or_higher),
            None => self.config.neutral_color.as_str(),
        }
    }

    /// Clears `surface` and draws counties, state borders, nation outline and
    /// legend onto it.
    pub fn draw(&self, surface: &mut Surface) -> DrawSummary {
        surface.clear();
        surface.width = self.config.width;
        surface.height = self.config.height;

        let projector = self.projection.as_ref();
        let shapes: Vec<CountyShape> = self
            .counties
            .par_iter()
            .map(|county| {
                let projected = projection::project_multipolygon(projector, &county.geometry);
                let record = self.education.get(county.fips).cloned();
                CountyShape {
                    fips: county.fips,
                    d: projection::polygon_path(&projected),
                    fill: self.fill_for(record.as_ref()).to_string(),
                    projected,
                    record,
                }
            })
            .collect();

        let mut summary = DrawSummary {
            counties: shapes.len(),
            missing: Vec::new(),
        };
        for shape in shapes {
            if shape.record.is_none() {
                warn!(fips = shape.fips, "No education record for county, using neutral fill");
                summary.missing.push(shape.fips);
            }
            surface.elements.push(Element::County(shape));
        }

        let borders = projection::project_lines(projector, &self.mesh);
        surface.elements.push(Element::StateBorders {
            d: projection::line_path(&borders),
        });
        if let Some(nation) = &self.nation {
            let outline = projection::project_multipolygon(projector, nation);
            surface.elements.push(Element::Nation {
                d: projection::polygon_path(&outline),
            });
        }
        surface.legend = Some(self.legend.clone());

        summary
    }

    /// Decoded counties as GeoJSON, with education attributes as properties.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .counties
            .iter()
            .map(|county| {
                let record = self.education.get(county.fips);
                let mut properties = JsonObject::new();
                properties.insert("fips".to_string(), json!(county.fips));
                properties.insert("fill".to_string(), json!(self.fill_for(record)));
                if let Some(r) = record {
                    properties.insert("area_name".to_string(), json!(r.area_name));
                    properties.insert("state".to_string(), json!(r.state));
                    properties.insert("bachelorsOrHigher".to_string(), json!(r.bachelors_or_higher));
                }
                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(geojson::Value::from(&county.geometry))),
                    id: Some(Id::Number(county.fips.into())),
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

/// The complete HTML page: map, legend, tooltip container and hover script.
pub fn render_page(surface: &Surface, config: &RenderConfig) -> String {
    let legend = surface.legend().map(Legend::to_svg).unwrap_or_default();

    PAGE_TEMPLATE
        .replace("{{title}}", &escape(&config.title))
        .replace("{{description}}", &escape(&config.description))
        .replace("{{opacity}}", &tooltip::VISIBLE_OPACITY.to_string())
        .replace("{{offset_x}}", &tooltip::OFFSET_X.to_string())
        .replace("{{offset_y}}", &tooltip::OFFSET_Y.to_string())
        .replace("{{legend}}", &legend)
        .replace("{{map}}", &surface.to_svg())
}

pub fn generate_page(config: &AppConfig, map: &Choropleth) -> Result<()> {
    let mut surface = Surface::default();
    let summary = map.draw(&mut surface);
    let html = render_page(&surface, &config.render);

    let path: &Path = &config.output.html;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    fs::write(path, html).with_context(|| format!("Failed to write page: {:?}", path))?;

    info!(
        path = ?path,
        counties = summary.counties,
        missing = summary.missing.len(),
        "Page written"
    );
    Ok(())
}
