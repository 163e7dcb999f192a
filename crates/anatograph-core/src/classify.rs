//! Keyword classification of structures.
//!
//! Matching is substring-based over the lower-cased `name definition` text.
//! Kinds are tried in a fixed priority order and the first hit wins, so the
//! result is reproducible for the same text.

use anatograph_store::{Structure, StructureKind};

const RULES: &[(StructureKind, &[&str])] = &[
    (
        StructureKind::Muscle,
        &["muscle", "muscular", "rectus", "oblique", "levator", "tensor"],
    ),
    (
        StructureKind::Bone,
        &["bone", "ossicle", "vertebra", "cranium", "nasal", "vomer", "maxilla"],
    ),
    (StructureKind::Nerve, &["nerve", "neural", "ganglion", "plexus"]),
    (StructureKind::Vessel, &["artery", "vein", "vessel", "vascular"]),
    (
        StructureKind::Cavity,
        &["cavity", "space", "sinus", "passage", "meatus"],
    ),
    (StructureKind::Category, &["system", "region", "group"]),
];

/// Classify free text (name plus optional definition).
pub fn classify_text(name: &str, definition: Option<&str>) -> StructureKind {
    let text = format!("{} {}", name, definition.unwrap_or_default()).to_lowercase();
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(kind, _)| *kind)
        .unwrap_or(StructureKind::Organ)
}

pub fn classify(structure: &Structure) -> StructureKind {
    classify_text(&structure.name, structure.definition.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_decides_overlaps() {
        // "nasal" (bone) beats "cavity" because bone is checked first.
        assert_eq!(classify_text("Nasal cavity", None), StructureKind::Bone);
        // "tensor" (muscle) beats everything.
        assert_eq!(
            classify_text("Tensor veli palatini", Some("Nerve supplied")),
            StructureKind::Muscle
        );
        assert_eq!(classify_text("Oral cavity", None), StructureKind::Cavity);
    }

    #[test]
    fn definition_text_participates() {
        assert_eq!(classify_text("Stapes", None), StructureKind::Organ);
        assert_eq!(
            classify_text("Stapes", Some("Smallest ossicle of the middle ear")),
            StructureKind::Bone
        );
        assert_eq!(classify_text("Vagus", Some("Tenth cranial NERVE")), StructureKind::Nerve);
    }

    #[test]
    fn fallbacks() {
        assert_eq!(classify_text("Digestive system", None), StructureKind::Category);
        assert_eq!(classify_text("Carotid artery", None), StructureKind::Vessel);
        assert_eq!(classify_text("Liver", None), StructureKind::Organ);
    }
}
