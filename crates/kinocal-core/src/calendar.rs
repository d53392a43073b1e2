//! The aggregated, cinema-indexed calendar.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::showing::SourceResult;

/// Final output of an aggregation run: cinema name to that cinema's showings.
///
/// Cinemas keep the order they were inserted in, both when iterating and when
/// serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Calendar {
    entries: Vec<(String, SourceResult)>,
}

impl Calendar {
    /// Creates an empty calendar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a cinema's result. Re-inserting a cinema replaces its result in
    /// place without changing its position.
    pub fn insert(&mut self, cinema: impl Into<String>, result: SourceResult) {
        let cinema = cinema.into();
        if let Some(entry) = self.entries.iter_mut().find(|(name, _)| *name == cinema) {
            entry.1 = result;
        } else {
            self.entries.push((cinema, result));
        }
    }

    /// Result for one cinema.
    pub fn get(&self, cinema: &str) -> Option<&SourceResult> {
        self.entries
            .iter()
            .find(|(name, _)| name == cinema)
            .map(|(_, result)| result)
    }

    /// Cinema names in insertion order.
    pub fn cinemas(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Iterates over `(cinema, result)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceResult)> {
        self.entries.iter().map(|(name, result)| (name.as_str(), result))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Calendar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (cinema, result) in &self.entries {
            map.serialize_entry(cinema, result)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::showing::Showing;
    use chrono::NaiveDate;

    fn one_showing(title: &str) -> SourceResult {
        let day = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
        std::iter::once(Showing::new(day, title, "https://example.com")).collect()
    }

    #[test]
    fn keeps_insertion_order() {
        let mut cal = Calendar::new();
        cal.insert("Somerville", one_showing("A"));
        cal.insert("Alamo", one_showing("B"));
        cal.insert("Coolidge", one_showing("C"));

        let names: Vec<_> = cal.cinemas().collect();
        assert_eq!(names, vec!["Somerville", "Alamo", "Coolidge"]);
        assert_eq!(cal.len(), 3);
    }

    #[test]
    fn reinsert_replaces_in_place() {
        let mut cal = Calendar::new();
        cal.insert("Alamo", one_showing("Old"));
        cal.insert("Brattle", one_showing("X"));
        cal.insert("Alamo", one_showing("New"));

        let names: Vec<_> = cal.cinemas().collect();
        assert_eq!(names, vec!["Alamo", "Brattle"]);
        let day = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
        assert_eq!(cal.get("Alamo").unwrap().get(day).unwrap()[0].title(), "New");
    }

    #[test]
    fn serializes_in_insertion_order() {
        let mut cal = Calendar::new();
        cal.insert("Zeta", one_showing("Ikiru"));
        cal.insert("Alpha", one_showing("Ran"));

        insta::assert_json_snapshot!(cal, @r###"
        {
          "Zeta": {
            "2025-01-05": [
              {
                "date": "2025-01-05",
                "title": "Ikiru",
                "url": "https://example.com"
              }
            ]
          },
          "Alpha": {
            "2025-01-05": [
              {
                "date": "2025-01-05",
                "title": "Ran",
                "url": "https://example.com"
              }
            ]
          }
        }
        "###);
    }
}
