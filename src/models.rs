use derive_builder::Builder;
use getset::Getters;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Manga,
    Manhwa,
    Manhua,
    RussianComic,
    WesternComic,
    IndonesianComic,
}

impl Kind {
    pub fn from_site_name(name: &str) -> Option<Self> {
        match name {
            "Манга" => Some(Self::Manga),
            "Манхва" => Some(Self::Manhwa),
            "Маньхуа" => Some(Self::Manhua),
            "Рукомикс" => Some(Self::RussianComic),
            "Западный комикс" => Some(Self::WesternComic),
            "Индонезийский комикс" => Some(Self::IndonesianComic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ongoing,
    Completed,
    Announced,
    Dropped,
}

impl Status {
    pub fn from_site_name(name: &str) -> Option<Self> {
        match name {
            "Продолжается" => Some(Self::Ongoing),
            "Закончен" => Some(Self::Completed),
            "Анонс" => Some(Self::Announced),
            "Заморожен" | "Нет переводчика" | "Не переводится (лицензировано)" => {
                Some(Self::Dropped)
            }
            _ => None,
        }
    }
}

/// Maps the site's age rating id to an age limit in years.
pub(crate) fn age_limit_from_id(id: u8) -> Option<u8> {
    match id {
        0 => Some(0),
        1 => Some(16),
        2 => Some(18),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Getters, PartialEq)]
#[getset(get = "pub")]
pub struct Slide {
    pub(crate) index: usize,
    pub(crate) link: String,
    pub(crate) width: Option<u32>,
    pub(crate) height: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Getters, Builder)]
#[getset(get = "pub")]
#[builder(setter(into))]
pub struct Chapter {
    pub(crate) id: u64,
    #[builder(default)]
    pub(crate) volume: Option<u32>,
    #[builder(default)]
    pub(crate) number: Option<String>,
    #[builder(default)]
    pub(crate) name: Option<String>,
    #[builder(default)]
    pub(crate) is_paid: bool,
    #[builder(default)]
    pub(crate) workers: Vec<String>,
    #[builder(default)]
    pub(crate) extra: BTreeMap<String, String>,
    #[builder(default)]
    pub(crate) slides: Vec<Slide>,
}

impl Chapter {
    pub(crate) fn add_slide(&mut self, link: String, width: Option<u32>, height: Option<u32>) {
        let index = self.slides.len() + 1;
        self.slides.push(Slide {
            index,
            link,
            width,
            height,
        });
    }
}

#[derive(Debug, Clone, Serialize, Getters)]
#[getset(get = "pub")]
pub struct Branch {
    pub(crate) id: u64,
    pub(crate) chapters: Vec<Chapter>,
}

impl Branch {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            chapters: Vec::new(),
        }
    }

    pub fn chapters_mut(&mut self) -> &mut Vec<Chapter> {
        &mut self.chapters
    }
}

#[derive(Debug, Clone, Serialize, Getters, Default, PartialEq)]
#[getset(get = "pub")]
pub struct Person {
    pub(crate) name: String,
    pub(crate) another_names: Vec<String>,
    pub(crate) images: Vec<String>,
    pub(crate) description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Getters, PartialEq)]
#[getset(get = "pub")]
pub struct Cover {
    pub(crate) link: String,
    pub(crate) filename: String,
    pub(crate) width: Option<u32>,
    pub(crate) height: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Getters, Default)]
#[getset(get = "pub")]
pub struct Title {
    pub(crate) slug: String,
    pub(crate) site: String,
    pub(crate) id: u64,
    pub(crate) content_language: String,
    pub(crate) localized_name: Option<String>,
    pub(crate) eng_name: Option<String>,
    pub(crate) another_names: Vec<String>,
    pub(crate) covers: Vec<Cover>,
    pub(crate) publication_year: Option<i32>,
    pub(crate) description: Option<String>,
    pub(crate) age_limit: Option<u8>,
    #[serde(rename = "type")]
    pub(crate) kind: Option<Kind>,
    pub(crate) status: Option<Status>,
    pub(crate) is_licensed: bool,
    pub(crate) genres: Vec<String>,
    pub(crate) tags: Vec<String>,
    pub(crate) persons: Vec<Person>,
    pub(crate) branches: Vec<Branch>,
}

impl Title {
    pub fn new(slug: impl ToString) -> Self {
        Self {
            slug: slug.to_string(),
            ..Default::default()
        }
    }

    pub fn branches_mut(&mut self) -> &mut Vec<Branch> {
        &mut self.branches
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_site_lookups() {
        assert_eq!(Kind::from_site_name("Маньхуа"), Some(Kind::Manhua));
        assert_eq!(Kind::from_site_name("Комикс"), None);
        assert_eq!(
            Status::from_site_name("Нет переводчика"),
            Some(Status::Dropped)
        );
        assert_eq!(Status::from_site_name("Закончен"), Some(Status::Completed));
        assert_eq!(Status::from_site_name(""), None);
        assert_eq!(age_limit_from_id(1), Some(16));
        assert_eq!(age_limit_from_id(7), None);
    }

    #[test]
    fn test_slides_are_indexed_from_one() {
        let mut chapter = ChapterBuilder::default().id(10u64).build().unwrap();
        chapter.add_slide("a".to_string(), Some(1), Some(2));
        chapter.add_slide("b".to_string(), None, None);
        let indices: Vec<usize> = chapter.slides().iter().map(|s| *s.index()).collect();
        assert_eq!(indices, vec![1, 2]);
    }
}
