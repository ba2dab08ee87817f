//! The sixteen German federal states and free-text location resolution.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Jurisdiction a tender is executed in. Serialized/displayed with the
/// English names the downstream dataset uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    #[serde(rename = "Baden-Württemberg")]
    BadenWuerttemberg,
    #[serde(rename = "Bavaria")]
    Bavaria,
    #[serde(rename = "Berlin")]
    Berlin,
    #[serde(rename = "Brandenburg")]
    Brandenburg,
    #[serde(rename = "Bremen")]
    Bremen,
    #[serde(rename = "Hamburg")]
    Hamburg,
    #[serde(rename = "Hesse")]
    Hesse,
    #[serde(rename = "Mecklenburg-Vorpommern")]
    MecklenburgVorpommern,
    #[serde(rename = "Lower Saxony")]
    LowerSaxony,
    #[serde(rename = "North Rhine-Westphalia")]
    NorthRhineWestphalia,
    #[serde(rename = "Rhineland-Palatinate")]
    RhinelandPalatinate,
    #[serde(rename = "Saarland")]
    Saarland,
    #[serde(rename = "Saxony")]
    Saxony,
    #[serde(rename = "Saxony-Anhalt")]
    SaxonyAnhalt,
    #[serde(rename = "Schleswig-Holstein")]
    SchleswigHolstein,
    #[serde(rename = "Thuringia")]
    Thuringia,
    #[serde(rename = "not specified")]
    NotSpecified,
}

impl State {
    pub fn display_name(&self) -> &'static str {
        match self {
            State::BadenWuerttemberg => "Baden-Württemberg",
            State::Bavaria => "Bavaria",
            State::Berlin => "Berlin",
            State::Brandenburg => "Brandenburg",
            State::Bremen => "Bremen",
            State::Hamburg => "Hamburg",
            State::Hesse => "Hesse",
            State::MecklenburgVorpommern => "Mecklenburg-Vorpommern",
            State::LowerSaxony => "Lower Saxony",
            State::NorthRhineWestphalia => "North Rhine-Westphalia",
            State::RhinelandPalatinate => "Rhineland-Palatinate",
            State::Saarland => "Saarland",
            State::Saxony => "Saxony",
            State::SaxonyAnhalt => "Saxony-Anhalt",
            State::SchleswigHolstein => "Schleswig-Holstein",
            State::Thuringia => "Thuringia",
            State::NotSpecified => "not specified",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// City names as they appear in portal location fields. German spellings are
/// listed alongside the anglicized ones because the portals print both.
/// First match wins during resolution.
const CITY_TO_STATE: &[(&str, State)] = &[
    ("Berlin", State::Berlin),
    ("Hamburg", State::Hamburg),
    ("Munich", State::Bavaria),
    ("München", State::Bavaria),
    ("Cologne", State::NorthRhineWestphalia),
    ("Köln", State::NorthRhineWestphalia),
    ("Frankfurt", State::Hesse),
    ("Stuttgart", State::BadenWuerttemberg),
    ("Düsseldorf", State::NorthRhineWestphalia),
    ("Dortmund", State::NorthRhineWestphalia),
    ("Essen", State::NorthRhineWestphalia),
    ("Leipzig", State::Saxony),
    ("Bremen", State::Bremen),
    ("Dresden", State::Saxony),
    ("Hanover", State::LowerSaxony),
    ("Hannover", State::LowerSaxony),
    ("Nuremberg", State::Bavaria),
    ("Nürnberg", State::Bavaria),
    ("Duisburg", State::NorthRhineWestphalia),
    ("Bochum", State::NorthRhineWestphalia),
    ("Wuppertal", State::NorthRhineWestphalia),
    ("Bielefeld", State::NorthRhineWestphalia),
    ("Bonn", State::NorthRhineWestphalia),
    ("Münster", State::NorthRhineWestphalia),
    ("Karlsruhe", State::BadenWuerttemberg),
    ("Mannheim", State::BadenWuerttemberg),
    ("Augsburg", State::Bavaria),
    ("Wiesbaden", State::Hesse),
    ("Gelsenkirchen", State::NorthRhineWestphalia),
    ("Mönchengladbach", State::NorthRhineWestphalia),
    ("Braunschweig", State::LowerSaxony),
    ("Chemnitz", State::Saxony),
    ("Kiel", State::SchleswigHolstein),
    ("Aachen", State::NorthRhineWestphalia),
    ("Halle", State::SaxonyAnhalt),
    ("Magdeburg", State::SaxonyAnhalt),
    ("Freiburg", State::BadenWuerttemberg),
    ("Krefeld", State::NorthRhineWestphalia),
    ("Lübeck", State::SchleswigHolstein),
    ("Oberhausen", State::NorthRhineWestphalia),
    ("Erfurt", State::Thuringia),
    ("Mainz", State::RhinelandPalatinate),
    ("Rostock", State::MecklenburgVorpommern),
    ("Kassel", State::Hesse),
    ("Hagen", State::NorthRhineWestphalia),
    ("Hamm", State::NorthRhineWestphalia),
    ("Saarbrücken", State::Saarland),
    ("Mülheim", State::NorthRhineWestphalia),
    ("Potsdam", State::Brandenburg),
    ("Ludwigshafen", State::RhinelandPalatinate),
    ("Oldenburg", State::LowerSaxony),
    ("Leverkusen", State::NorthRhineWestphalia),
    ("Osnabrück", State::LowerSaxony),
    ("Solingen", State::NorthRhineWestphalia),
    ("Herne", State::NorthRhineWestphalia),
    ("Neuss", State::NorthRhineWestphalia),
    ("Heidelberg", State::BadenWuerttemberg),
    ("Darmstadt", State::Hesse),
    ("Paderborn", State::NorthRhineWestphalia),
    ("Regensburg", State::Bavaria),
    ("Ingolstadt", State::Bavaria),
    ("Würzburg", State::Bavaria),
    ("Fürth", State::Bavaria),
    ("Wolfsburg", State::LowerSaxony),
    ("Offenbach", State::Hesse),
    ("Ulm", State::BadenWuerttemberg),
    ("Heilbronn", State::BadenWuerttemberg),
    ("Pforzheim", State::BadenWuerttemberg),
    ("Göttingen", State::LowerSaxony),
    ("Bottrop", State::NorthRhineWestphalia),
    ("Trier", State::RhinelandPalatinate),
    ("Recklinghausen", State::NorthRhineWestphalia),
    ("Reutlingen", State::BadenWuerttemberg),
    ("Bremerhaven", State::Bremen),
    ("Koblenz", State::RhinelandPalatinate),
    ("Bergisch Gladbach", State::NorthRhineWestphalia),
    ("Jena", State::Thuringia),
    ("Remscheid", State::NorthRhineWestphalia),
    ("Erlangen", State::Bavaria),
    ("Moers", State::NorthRhineWestphalia),
    ("Siegen", State::NorthRhineWestphalia),
    ("Hildesheim", State::LowerSaxony),
    ("Salzgitter", State::LowerSaxony),
];

/// Maps free-text location fields to a state by substring containment.
/// The table is immutable data built once at startup and shared by reference;
/// per-portal fallback defaults are applied later by the consolidator.
#[derive(Debug, Clone)]
pub struct StateResolver {
    cities: Vec<(String, State)>,
}

impl StateResolver {
    pub fn new() -> Self {
        Self {
            cities: CITY_TO_STATE
                .iter()
                .map(|(city, state)| (city.to_string(), *state))
                .collect(),
        }
    }

    /// Custom table, mainly for callers that load city data from config.
    pub fn with_table(cities: Vec<(String, State)>) -> Self {
        Self { cities }
    }

    pub fn resolve(&self, location: &str) -> State {
        self.cities
            .iter()
            .find(|(city, _)| location.contains(city.as_str()))
            .map(|(_, state)| *state)
            .unwrap_or(State::NotSpecified)
    }
}

impl Default for StateResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_german_city_spelling_inside_free_text() {
        let resolver = StateResolver::new();
        assert_eq!(resolver.resolve("Ausschreibung in München"), State::Bavaria);
    }

    #[test]
    fn resolves_anglicized_spelling() {
        let resolver = StateResolver::new();
        assert_eq!(resolver.resolve("Munich, Theresienstraße 15"), State::Bavaria);
        assert_eq!(resolver.resolve("53111 Bonn"), State::NorthRhineWestphalia);
    }

    #[test]
    fn unknown_location_yields_not_specified() {
        let resolver = StateResolver::new();
        assert_eq!(resolver.resolve("Musterstadt"), State::NotSpecified);
        assert_eq!(resolver.resolve(""), State::NotSpecified);
    }

    #[test]
    fn display_names_match_dataset_vocabulary() {
        assert_eq!(State::NorthRhineWestphalia.to_string(), "North Rhine-Westphalia");
        assert_eq!(State::NotSpecified.to_string(), "not specified");
    }
}
