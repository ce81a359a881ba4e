// src/pipeline/map.rs

//! Rows → roster records.

use std::collections::HashMap;

use crate::models::{Column, SheetSchema, Student, Teacher};
use crate::pipeline::parse::Table;

/// Decode every usable row into a [`Student`].
///
/// Rows with a blank name are dropped. A header narrower than the schema
/// is logged but does not stop decoding.
pub fn map_students(table: &Table, schema: &SheetSchema) -> Vec<Student> {
    schema.check_header(&table.header);

    let mut skipped = 0usize;
    let students: Vec<Student> = table
        .rows
        .iter()
        .filter_map(|fields| {
            let row = schema.row(fields);
            if !row.is_complete() {
                skipped += 1;
                return None;
            }
            Some(Student {
                name: row.trimmed(Column::StudentName).to_string(),
                assigned_teacher: row.trimmed(Column::AssignedTeacher).to_string(),
                contract: row.trimmed(Column::Contract).to_string(),
                level: row.trimmed(Column::Level).to_string(),
                finished_activities: row.trimmed(Column::FinishedActivities).to_string(),
                workplace: row.trimmed(Column::Workplace).to_string(),
                role: row.trimmed(Column::Role).to_string(),
                nationality: row.trimmed(Column::Nationality).to_string(),
                location: row.trimmed(Column::Location).to_string(),
                email: row.trimmed(Column::Email).to_string(),
                whatsapp: row.trimmed(Column::Whatsapp).to_string(),
                image_url: row.trimmed(Column::ImageUrl).to_string(),
                class_link: row.trimmed(Column::ClassLink).to_string(),
                vocabulary_url: row.trimmed(Column::VocabularyUrl).to_string(),
                learning_objective: row.trimmed(Column::LearningObjective).to_string(),
            })
        })
        .collect();

    if skipped > 0 {
        log::debug!("Skipped {skipped} row(s) without a student name");
    }
    log::info!("📊 Parsed {} student(s) from the sheet", students.len());
    students
}

/// Group students under their assigned teacher, in first-seen order.
///
/// Students without a teacher are left out.
pub fn group_teachers(students: &[Student]) -> Vec<Teacher> {
    let mut teachers: Vec<Teacher> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for student in students {
        let name = student.assigned_teacher.as_str();
        if name.is_empty() {
            continue;
        }
        let slot = *index.entry(name).or_insert_with(|| {
            teachers.push(Teacher {
                name: name.to_string(),
                students: Vec::new(),
            });
            teachers.len() - 1
        });
        teachers[slot].students.push(student.clone());
    }

    log::info!("📊 Found {} teacher(s) in the sheet", teachers.len());
    teachers
}
