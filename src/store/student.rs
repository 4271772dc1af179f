// src/store/student.rs
use anyhow::{Context, Result};
use sqlx::{Any, AnyConnection};

use super::inserted_id;
use crate::process::StudentRecord;

/// A student row ready to insert: source fields plus resolved references.
#[derive(Debug)]
pub struct NewStudent<'a> {
    pub record: &'a StudentRecord,
    pub speciality_id: i64,
    pub section_id: i64,
    /// `(first.last@, first-last@)` when derivation is enabled.
    pub emails: Option<(String, String)>,
}

/// Plain insert. The same record written twice yields two rows.
pub async fn insert_student(conn: &mut AnyConnection, student: &NewStudent<'_>) -> Result<i64> {
    let rec = student.record;
    let (email, email_alt) = match &student.emails {
        Some((dot, dash)) => (Some(dot.as_str()), Some(dash.as_str())),
        None => (None, None),
    };

    let done = sqlx::query::<Any>(
        "INSERT INTO students (matricule, nom, prenom, etat, groupe_td, speciality_id, section_id, number, email, email_alt)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(rec.matricule.as_deref())
    .bind(rec.nom.as_deref())
    .bind(rec.prenom.as_deref())
    .bind(rec.etat.as_deref())
    .bind(rec.groupe_td.as_deref())
    .bind(student.speciality_id)
    .bind(student.section_id)
    .bind(rec.number.as_deref())
    .bind(email)
    .bind(email_alt)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("inserting student {:?}", rec.matricule))?;

    inserted_id(conn, &done).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::{count, memory_session};
    use crate::store::{resolve, SectionKey, SpecialityKey, STUDENTS};

    fn sample() -> StudentRecord {
        StudentRecord {
            matricule: Some("202031045678".into()),
            nom: Some("Dupont".into()),
            prenom: Some("Jean".into()),
            etat: Some("Inscrit".into()),
            groupe_td: Some("G2".into()),
            palier: Some("L2".into()),
            specialite: Some("Informatique".into()),
            section: Some("A".into()),
            number: Some("17".into()),
        }
    }

    #[tokio::test]
    async fn writes_all_fields() {
        let mut session = memory_session().await;
        let rec = sample();
        let speciality_id = resolve(
            session.conn(),
            &SpecialityKey::new(rec.palier.as_deref(), rec.specialite.as_deref()),
        )
        .await
        .unwrap();
        let section_id = resolve(session.conn(), &SectionKey::new(rec.section.as_deref()))
            .await
            .unwrap();

        let student = NewStudent {
            record: &rec,
            speciality_id,
            section_id,
            emails: Some(("jean.dupont@u.dz".into(), "jean-dupont@u.dz".into())),
        };
        insert_student(session.conn(), &student).await.unwrap();

        let (matricule, prenom, spec, email_alt): (String, String, i64, String) = sqlx::query_as(
            "SELECT matricule, prenom, speciality_id, email_alt FROM students",
        )
        .fetch_one(session.conn())
        .await
        .unwrap();
        assert_eq!(matricule, "202031045678");
        assert_eq!(prenom, "Jean");
        assert_eq!(spec, speciality_id);
        assert_eq!(email_alt, "jean-dupont@u.dz");
    }

    #[tokio::test]
    async fn same_record_twice_is_two_rows() {
        let mut session = memory_session().await;
        let rec = StudentRecord {
            matricule: Some("1".into()),
            ..Default::default()
        };
        let speciality_id = resolve(session.conn(), &SpecialityKey::new(None, None))
            .await
            .unwrap();
        let section_id = resolve(session.conn(), &SectionKey::new(None)).await.unwrap();
        let student = NewStudent {
            record: &rec,
            speciality_id,
            section_id,
            emails: None,
        };

        let a = insert_student(session.conn(), &student).await.unwrap();
        let b = insert_student(session.conn(), &student).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(count(&mut session, STUDENTS).await, 2);

        let email: Option<String> = sqlx::query_scalar("SELECT email FROM students LIMIT 1")
            .fetch_one(session.conn())
            .await
            .unwrap();
        assert_eq!(email, None);
    }
}
