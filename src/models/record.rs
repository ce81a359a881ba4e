//! Roster records decoded from the sheet.

use serde::{Deserialize, Serialize};

use crate::models::{ArtifactKey, ArtifactKind};

/// Meeting platforms recognised in class links, in match order.
const CLASS_LINK_ICONS: &[(&str, &str)] = &[("teams", "🎥"), ("zoom", "📹"), ("meet", "💻")];

/// Icon for a class link that matches no known platform.
pub const GENERIC_LINK_ICON: &str = "🔗";

/// Anything materialized as one artifact per natural key.
pub trait Record: Clone + Send + Sync + Serialize {
    const KIND: ArtifactKind;

    /// The natural key as it appears in the sheet.
    fn name(&self) -> &str;

    fn artifact_key(&self) -> ArtifactKey {
        ArtifactKey::new(Self::KIND, self.name())
    }
}

/// One student row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Student {
    pub name: String,
    pub assigned_teacher: String,
    /// Platform the student was contracted through (Preply, Italki, ...)
    pub contract: String,
    pub level: String,
    /// Comma-joined activity links, oldest first
    pub finished_activities: String,
    pub workplace: String,
    pub role: String,
    pub nationality: String,
    pub location: String,
    pub email: String,
    /// Raw phone number as typed in the sheet
    pub whatsapp: String,
    pub image_url: String,
    pub class_link: String,
    pub vocabulary_url: String,
    pub learning_objective: String,
}

impl Student {
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::new(ArtifactKind::StudentPage, &self.name)
    }

    pub fn file_name(&self) -> String {
        self.key().file_name()
    }

    /// Phone number with every non-digit removed.
    pub fn phone_digits(&self) -> String {
        self.whatsapp.chars().filter(|c| c.is_ascii_digit()).collect()
    }

    /// `https://wa.me/<digits>`, or empty when there is no number.
    pub fn whatsapp_link(&self) -> String {
        let digits = self.phone_digits();
        if digits.is_empty() {
            String::new()
        } else {
            format!("https://wa.me/{digits}")
        }
    }

    /// Icon for the class link's meeting platform.
    pub fn class_link_icon(&self) -> &'static str {
        let link = self.class_link.trim().to_lowercase();
        if link.is_empty() {
            return "";
        }
        CLASS_LINK_ICONS
            .iter()
            .find(|(needle, _)| link.contains(needle))
            .map(|(_, icon)| *icon)
            .unwrap_or(GENERIC_LINK_ICON)
    }

    pub fn has_class_link(&self) -> bool {
        !self.class_link.trim().is_empty()
    }
}

impl Record for Student {
    const KIND: ArtifactKind = ArtifactKind::StudentPage;

    fn name(&self) -> &str {
        &self.name
    }
}

/// A teacher and the students assigned to them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Teacher {
    pub name: String,
    pub students: Vec<Student>,
}

impl Teacher {
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::new(ArtifactKind::TeacherDashboard, &self.name)
    }

    pub fn file_name(&self) -> String {
        self.key().file_name()
    }

    /// Distinct non-empty contract platforms, first seen first.
    pub fn platforms(&self) -> Vec<String> {
        let mut platforms: Vec<String> = Vec::new();
        for student in &self.students {
            let contract = student.contract.trim();
            if !contract.is_empty() && !platforms.iter().any(|p| p == contract) {
                platforms.push(contract.to_string());
            }
        }
        platforms
    }

    /// Students with a class link.
    pub fn active_classes(&self) -> usize {
        self.students.iter().filter(|s| s.has_class_link()).count()
    }

    pub fn total_students(&self) -> usize {
        self.students.len()
    }
}

impl Record for Teacher {
    const KIND: ArtifactKind = ArtifactKind::TeacherDashboard;

    fn name(&self) -> &str {
        &self.name
    }
}
