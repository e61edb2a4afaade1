//! Searchable documents built from catalog entries.

use serde::{Deserialize, Serialize};

use crate::catalog::{Character, Location};

/// Residents listed by name in a location document; the rest are counted
const MAX_LISTED_RESIDENTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Character,
    Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

fn or_empty(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

pub fn character_document(character: &Character) -> Document {
    let origin = character.origin.as_ref().map(|o| o.name.as_str()).unwrap_or("");
    let location = character
        .location
        .as_ref()
        .map(|l| l.name.as_str())
        .unwrap_or("");
    let content = format!(
        "Character: {}\nStatus: {}\nSpecies: {}\nType: {}\nGender: {}\nOrigin: {}\nLocation: {}",
        character.name,
        or_empty(&character.status),
        or_empty(&character.species),
        or_empty(&character.kind),
        or_empty(&character.gender),
        origin,
        location
    );
    Document {
        content,
        metadata: DocumentMetadata {
            id: character.id.clone(),
            kind: DocumentKind::Character,
            name: character.name.clone(),
        },
    }
}

pub fn location_document(location: &Location) -> Document {
    let mut residents = location
        .residents
        .iter()
        .take(MAX_LISTED_RESIDENTS)
        .map(|r| r.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    if location.residents.len() > MAX_LISTED_RESIDENTS {
        residents.push_str(&format!(
            " and {} others",
            location.residents.len() - MAX_LISTED_RESIDENTS
        ));
    }

    let content = format!(
        "Location: {}\nType: {}\nDimension: {}\nResidents: {}",
        location.name,
        or_empty(&location.kind),
        or_empty(&location.dimension),
        residents
    );
    Document {
        content,
        metadata: DocumentMetadata {
            id: location.id.clone(),
            kind: DocumentKind::Location,
            name: location.name.clone(),
        },
    }
}

/// Characters first, then locations
pub fn create_documents(characters: &[Character], locations: &[Location]) -> Vec<Document> {
    characters
        .iter()
        .map(character_document)
        .chain(locations.iter().map(location_document))
        .collect()
}
