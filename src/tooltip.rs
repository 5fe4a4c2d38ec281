//! Hover tooltip state. The page script applies the same constants and text
//! format in the browser; the server answers hover queries with this type.

use crate::types::EducationRecord;
use serde::Serialize;

pub const VISIBLE_OPACITY: f64 = 0.9;
pub const OFFSET_X: f64 = 10.0;
pub const OFFSET_Y: f64 = -28.0;

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Tooltip {
    pub opacity: f64,
    pub text: String,
    pub left: f64,
    pub top: f64,
    pub fips: Option<u32>,
    pub education: Option<f64>,
}

pub fn tooltip_text(fips: u32, record: Option<&EducationRecord>) -> String {
    match record {
        Some(r) => format!("{}, {}: {}%", r.area_name, r.state, r.bachelors_or_higher),
        None => format!("FIPS {}: no data", fips),
    }
}

impl Tooltip {
    pub fn show(&mut self, fips: u32, record: Option<&EducationRecord>, cursor: (f64, f64)) {
        self.opacity = VISIBLE_OPACITY;
        self.text = tooltip_text(fips, record);
        self.left = cursor.0 + OFFSET_X;
        self.top = cursor.1 + OFFSET_Y;
        self.fips = Some(fips);
        self.education = record.map(|r| r.bachelors_or_higher);
    }

    pub fn hide(&mut self) {
        self.opacity = 0.0;
    }

    pub fn is_visible(&self) -> bool {
        self.opacity > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn autauga() -> EducationRecord {
        EducationRecord {
            fips: 1001,
            state: "AL".into(),
            area_name: "Autauga County".into(),
            bachelors_or_higher: 21.9,
        }
    }

    #[test]
    fn hover_shows_county_text_near_cursor() {
        let mut tooltip = Tooltip::default();
        assert!(!tooltip.is_visible());

        tooltip.show(1001, Some(&autauga()), (100.0, 200.0));
        assert!(tooltip.is_visible());
        assert_eq!(tooltip.opacity, VISIBLE_OPACITY);
        assert_eq!(tooltip.text, "Autauga County, AL: 21.9%");
        assert_eq!((tooltip.left, tooltip.top), (110.0, 172.0));
        assert_eq!(tooltip.education, Some(21.9));
    }

    #[test]
    fn leave_hides_tooltip() {
        let mut tooltip = Tooltip::default();
        tooltip.show(1001, Some(&autauga()), (0.0, 0.0));
        tooltip.hide();
        assert_eq!(tooltip.opacity, 0.0);
        assert!(!tooltip.is_visible());
    }

    #[test]
    fn county_without_record() {
        let mut tooltip = Tooltip::default();
        tooltip.show(2016, None, (0.0, 0.0));
        assert_eq!(tooltip.text, "FIPS 2016: no data");
        assert_eq!(tooltip.education, None);
    }

    #[test]
    fn whole_percentages_have_no_fraction() {
        let mut record = autauga();
        record.bachelors_or_higher = 30.0;
        assert_eq!(tooltip_text(1001, Some(&record)), "Autauga County, AL: 30%");
    }
}
