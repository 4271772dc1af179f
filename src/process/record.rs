// src/process/record.rs
use super::normalize::Record;

pub const COL_MATRICULE: &str = "Matricule";
pub const COL_NOM: &str = "Nom";
pub const COL_PRENOM: &str = "Prénom";
pub const COL_ETAT: &str = "Etat";
pub const COL_GROUPE_TD: &str = "Groupe TD";
pub const COL_PALIER: &str = "Palier";
pub const COL_SPECIALITE: &str = "Spécialité";
pub const COL_SECTION: &str = "Section";
pub const COL_NUMBER: &str = "N°";

/// A roster line with the columns the store cares about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentRecord {
    pub matricule: Option<String>,
    pub nom: Option<String>,
    pub prenom: Option<String>,
    pub etat: Option<String>,
    pub groupe_td: Option<String>,
    pub palier: Option<String>,
    pub specialite: Option<String>,
    pub section: Option<String>,
    pub number: Option<String>,
}

impl From<&Record> for StudentRecord {
    fn from(rec: &Record) -> Self {
        let get = |col: &str| rec.get(col).cloned().flatten();
        Self {
            matricule: get(COL_MATRICULE),
            nom: get(COL_NOM),
            prenom: get(COL_PRENOM),
            etat: get(COL_ETAT),
            groupe_td: get(COL_GROUPE_TD),
            palier: get(COL_PALIER),
            specialite: get(COL_SPECIALITE),
            section: get(COL_SECTION),
            number: get(COL_NUMBER),
        }
    }
}
