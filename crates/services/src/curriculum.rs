//! Curriculum packs: JSON import/export of a subject's skill list.
//!
//! A pack carries one subject and its `(topic, subtopic)` pairs. Import is
//! additive and all-or-nothing on validation: either every entry in the pack
//! is well formed, or nothing is written. Entries already present are skipped,
//! never duplicated.

use serde::{Deserialize, Serialize};

use storage::repository::SkillRepository;
use tutor_core::model::Subject;

use crate::error::CurriculumError;

/// Pack format version written on export. Imports accept any version string
/// for now; the field exists so a future format change can be detected.
pub const PACK_VERSION: &str = "v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackSkill {
    pub topic: String,
    pub subtopic: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumPack {
    pub subject: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub skills: Vec<PackSkill>,
}

/// Parses a pack from JSON text.
///
/// # Errors
///
/// Returns `CurriculumError::InvalidPack` if the JSON is malformed or the
/// subject field is blank.
pub fn load_pack(json: &str) -> Result<CurriculumPack, CurriculumError> {
    let pack: CurriculumPack =
        serde_json::from_str(json).map_err(|e| CurriculumError::InvalidPack(e.to_string()))?;
    if pack.subject.trim().is_empty() {
        return Err(CurriculumError::InvalidPack(
            "pack has no subject".to_string(),
        ));
    }
    Ok(pack)
}

/// Imports a pack's skills, skipping any that already exist.
///
/// Validation runs over the whole pack before anything is written, so a bad
/// entry in the middle never leaves a half-imported pack behind. Returns the
/// number of skills actually inserted.
///
/// # Errors
///
/// Returns `CurriculumError::InvalidPack` for an unknown subject or a blank
/// topic/subtopic, or storage errors.
pub async fn import_pack(
    skills: &dyn SkillRepository,
    pack: &CurriculumPack,
) -> Result<usize, CurriculumError> {
    let subject: Subject = pack
        .subject
        .parse()
        .map_err(|_| CurriculumError::InvalidPack(format!("unknown subject {:?}", pack.subject)))?;

    for (i, entry) in pack.skills.iter().enumerate() {
        if entry.topic.trim().is_empty() || entry.subtopic.trim().is_empty() {
            return Err(CurriculumError::InvalidPack(format!(
                "skill entry {i} has a blank topic or subtopic"
            )));
        }
    }

    let mut inserted = 0;
    for entry in &pack.skills {
        let topic = entry.topic.trim();
        let subtopic = entry.subtopic.trim();
        if skills.skill_exists(subject, topic, subtopic).await? {
            continue;
        }
        skills.insert_skill(subject, topic, subtopic).await?;
        inserted += 1;
    }
    Ok(inserted)
}

/// Exports a subject's skills as a pack, in `(topic, subtopic)` order.
///
/// # Errors
///
/// Returns storage errors.
pub async fn export_pack(
    skills: &dyn SkillRepository,
    subject: Subject,
) -> Result<CurriculumPack, CurriculumError> {
    let list = skills.list_skills(subject).await?;
    Ok(CurriculumPack {
        subject: subject.as_str().to_string(),
        version: PACK_VERSION.to_string(),
        skills: list
            .iter()
            .map(|s| PackSkill {
                topic: s.topic().to_string(),
                subtopic: s.subtopic().to_string(),
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::Storage;

    #[test]
    fn load_rejects_malformed_json_and_blank_subject() {
        assert!(matches!(
            load_pack("not json"),
            Err(CurriculumError::InvalidPack(_))
        ));
        assert!(matches!(
            load_pack(r#"{"subject": "  "}"#),
            Err(CurriculumError::InvalidPack(_))
        ));
    }

    #[test]
    fn load_defaults_missing_version_and_skills() {
        let pack = load_pack(r#"{"subject": "Math"}"#).unwrap();
        assert_eq!(pack.subject, "Math");
        assert_eq!(pack.version, "");
        assert!(pack.skills.is_empty());
    }

    #[tokio::test]
    async fn import_skips_existing_skills() {
        let storage = Storage::in_memory();
        storage
            .skills
            .insert_skill(Subject::Math, "Arithmetic", "Counting")
            .await
            .unwrap();

        let pack = CurriculumPack {
            subject: "Math".to_string(),
            version: PACK_VERSION.to_string(),
            skills: vec![
                PackSkill {
                    topic: "Arithmetic".to_string(),
                    subtopic: "Counting".to_string(),
                },
                PackSkill {
                    topic: "Arithmetic".to_string(),
                    subtopic: "Number bonds".to_string(),
                },
            ],
        };

        let inserted = import_pack(storage.skills.as_ref(), &pack).await.unwrap();
        assert_eq!(inserted, 1);

        let skills = storage.skills.list_skills(Subject::Math).await.unwrap();
        assert_eq!(skills.len(), 2);
    }

    #[tokio::test]
    async fn import_is_all_or_nothing_on_validation() {
        let storage = Storage::in_memory();
        let pack = CurriculumPack {
            subject: "Science".to_string(),
            version: PACK_VERSION.to_string(),
            skills: vec![
                PackSkill {
                    topic: "Nature".to_string(),
                    subtopic: "Seasons".to_string(),
                },
                PackSkill {
                    topic: "".to_string(),
                    subtopic: "Blank topic".to_string(),
                },
            ],
        };

        let err = import_pack(storage.skills.as_ref(), &pack).await.unwrap_err();
        assert!(matches!(err, CurriculumError::InvalidPack(_)));

        // The valid first entry was not written either.
        let skills = storage.skills.list_skills(Subject::Science).await.unwrap();
        assert!(skills.is_empty());
    }

    #[tokio::test]
    async fn import_rejects_unknown_subject() {
        let storage = Storage::in_memory();
        let pack = CurriculumPack {
            subject: "Astrology".to_string(),
            version: PACK_VERSION.to_string(),
            skills: Vec::new(),
        };
        let err = import_pack(storage.skills.as_ref(), &pack).await.unwrap_err();
        assert!(matches!(err, CurriculumError::InvalidPack(_)));
    }

    #[tokio::test]
    async fn export_roundtrips_through_load() {
        let storage = Storage::in_memory();
        storage
            .skills
            .insert_skill(Subject::Literacy, "Writing", "Sentences")
            .await
            .unwrap();
        storage
            .skills
            .insert_skill(Subject::Literacy, "Reading", "Phonics")
            .await
            .unwrap();

        let pack = export_pack(storage.skills.as_ref(), Subject::Literacy)
            .await
            .unwrap();
        assert_eq!(pack.version, PACK_VERSION);
        assert_eq!(pack.subject, "Literacy");
        // list_skills ordering carries through to the pack.
        assert_eq!(pack.skills[0].topic, "Reading");
        assert_eq!(pack.skills[1].topic, "Writing");

        let json = serde_json::to_string(&pack).unwrap();
        let reloaded = load_pack(&json).unwrap();
        assert_eq!(reloaded, pack);
    }
}
