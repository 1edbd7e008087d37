use super::ParserError;
use crate::models::{
    age_limit_from_id, Branch, Chapter, ChapterBuilder, Cover, Kind, Person, Status, Title,
};
use crate::net::{ApiRequest, ApiResponse};
use crate::portals::Portals;
use crate::settings::Settings;
use crate::stub::StubDetector;
use crate::text::{clean_description, html_to_text, rusificate_link};
use chrono::{DateTime, Local, NaiveDateTime};
use image::ImageReader;
use reqwest::IntoUrl;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tower::{Service, ServiceExt};
use tracing::{debug, instrument};

const CHAPTERS_PER_PAGE: u32 = 50;
const EMPTY_COVER: &str = "/media/None";
const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const SPACED_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Debug, Deserialize)]
struct Page<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct CatalogNote {
    dir: String,
}

#[derive(Debug, Deserialize)]
struct UpdateNote {
    upload_date: String,
    title: CatalogNote,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AgeLimit {
    id: u8,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CoverData {
    high: Option<String>,
    mid: Option<String>,
    low: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BranchData {
    id: u64,
    #[serde(default)]
    count_chapters: u32,
}

#[derive(Debug, Deserialize)]
struct TitleData {
    id: u64,
    main_name: Option<String>,
    secondary_name: Option<String>,
    another_name: Option<String>,
    #[serde(default)]
    cover: CoverData,
    issue_year: Option<i32>,
    description: Option<String>,
    age_limit: Option<AgeLimit>,
    #[serde(rename = "type")]
    kind: Option<Named>,
    status: Option<Named>,
    #[serde(default)]
    is_licensed: bool,
    #[serde(default)]
    genres: Vec<Named>,
    #[serde(default)]
    categories: Vec<Named>,
    #[serde(default)]
    branches: Vec<BranchData>,
}

#[derive(Debug, Deserialize)]
struct ChapterNote {
    id: u64,
    tome: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_string_from_number")]
    chapter: Option<String>,
    name: Option<String>,
    #[serde(default)]
    is_paid: bool,
    #[serde(default)]
    publishers: Vec<Named>,
    pub_date: Option<String>,
}

fn deserialize_string_from_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Deserialize::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct ChapterContent {
    pages: Pages,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Pages {
    Nested(Vec<Vec<PageData>>),
    Flat(Vec<PageData>),
}

impl Pages {
    fn flatten(self) -> Vec<PageData> {
        match self {
            Pages::Nested(pages) => pages.into_iter().flatten().collect(),
            Pages::Flat(pages) => pages,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PageData {
    link: String,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CharacterData {
    name: String,
    alt_name: Option<String>,
    cover: Option<CharacterCover>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CharacterCover {
    high: String,
    mid: String,
}

/// Connector for a single remanga-compatible site.
pub struct Parser<S, P> {
    service: S,
    settings: Settings,
    portals: P,
    detector: StubDetector,
    filters: PathBuf,
    temp: TempDir,
    paid_chapters_locked: bool,
}

impl<S, P> Parser<S, P>
where
    S: Service<ApiRequest, Response = ApiResponse, Error = ParserError>,
    P: Portals,
{
    /// `filters` is the stub library root, laid out as `<filters>/<category>/<pattern>`.
    pub fn new(
        service: S,
        settings: Settings,
        portals: P,
        filters: impl AsRef<Path>,
    ) -> Result<Self, ParserError> {
        let temp = tempfile::Builder::new().prefix("remanga").tempdir()?;
        Ok(Self {
            service,
            detector: StubDetector::new(settings.custom.stub_threshold),
            settings,
            portals,
            filters: filters.as_ref().to_path_buf(),
            temp,
            paid_chapters_locked: false,
        })
    }

    /// Location of the most recently downloaded cover.
    pub fn cover_path(&self) -> PathBuf {
        self.temp.path().join("cover")
    }

    async fn get(&mut self, url: String) -> Result<ApiResponse, ParserError> {
        let request = ApiRequest::new(url);
        self.service.ready().await?.call(request).await
    }

    fn failure<T>(&self, response: &ApiResponse, message: &str) -> Result<T, ParserError> {
        self.portals.request_error(response.status(), message);
        Err(ParserError::Status {
            status: response.status(),
            message: message.to_string(),
        })
    }

    /// Collects slugs from the catalog, or from recent updates when `period`
    /// (in hours) is given and non-zero.
    pub async fn collect(
        &mut self,
        period: Option<u64>,
        filters: Option<&str>,
        pages: Option<u32>,
    ) -> Result<Vec<String>, ParserError> {
        match period {
            Some(period) if period > 0 => {
                let now = Local::now().naive_local();
                self.collect_updates(period, pages, now).await
            }
            _ => {
                let filters = filters.unwrap_or_default();
                self.collect_catalog(filters, pages).await
            }
        }
    }

    #[instrument(skip(self))]
    async fn collect_catalog(
        &mut self,
        filters: &str,
        pages: Option<u32>,
    ) -> Result<Vec<String>, ParserError> {
        let mut slugs = Vec::new();
        let mut page = 1;
        loop {
            let url = format!(
                "https://{}/api/v2/search/catalog/?page={page}&count=30&ordering=-id&{filters}",
                self.settings.site
            );
            let response = self.get(url).await?;
            if !response.is_success() {
                return self.failure(&response, "Unable to request catalog.");
            }
            let notes: Page<CatalogNote> = response.json()?;
            let done = notes.results.is_empty() || pages == Some(page);
            slugs.extend(notes.results.into_iter().map(|n| n.dir));
            self.portals.collect_progress_by_page(page);
            if done {
                return Ok(slugs);
            }
            page += 1;
        }
    }

    #[instrument(skip(self))]
    async fn collect_updates(
        &mut self,
        period: u64,
        pages: Option<u32>,
        now: NaiveDateTime,
    ) -> Result<Vec<String>, ParserError> {
        let period = period.saturating_mul(3600);
        let mut slugs = Vec::new();
        let mut seen = HashSet::new();
        let mut page = 1;
        loop {
            let url = format!(
                "https://{}/api/v2/titles/last-chapters/?page={page}&count=30",
                self.settings.site
            );
            let response = self.get(url).await?;
            if !response.is_success() {
                return self.failure(&response, "Unable to request catalog.");
            }
            let notes: Page<UpdateNote> = response.json()?;
            let mut done = notes.results.is_empty() || pages == Some(page);
            for note in notes.results {
                let date = note.upload_date.as_str();
                let Some(uploaded) = parse_upload_date(date) else {
                    let message = format!("Unable to parse upload date \"{date}\".");
                    self.portals.error(&message);
                    continue;
                };
                if (now - uploaded).num_seconds().unsigned_abs() > period {
                    done = true;
                    break;
                }
                if seen.insert(note.title.dir.clone()) {
                    slugs.push(note.title.dir);
                }
            }
            self.portals.collect_progress_by_page(page);
            if done {
                return Ok(slugs);
            }
            page += 1;
        }
    }

    /// Fetches a title. `Ok(None)` means the site does not know the slug.
    #[instrument(skip(self))]
    pub async fn parse(&mut self, slug: &str) -> Result<Option<Title>, ParserError> {
        let site = self.settings.site.clone();
        let url = format!("https://{site}/api/v2/titles/{slug}/");
        let response = self.get(url).await?;
        match response.status() {
            200 => {}
            404 => {
                self.portals.title_not_found(slug);
                return Ok(None);
            }
            _ => return self.failure(&response, "Unable to request title data."),
        }
        let data: TitleData = response.json()?;

        let mut title = Title::new(slug);
        title.site = site;
        title.id = data.id;
        title.content_language = String::from("rus");
        title.localized_name = data.main_name;
        title.eng_name = data.secondary_name;
        title.another_names = data
            .another_name
            .as_deref()
            .unwrap_or_default()
            .split(" / ")
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        title.covers = self.covers(slug, &data.cover).await?;
        title.publication_year = data.issue_year;
        title.description = data.description.as_deref().and_then(clean_description);
        title.age_limit = data.age_limit.and_then(|a| age_limit_from_id(a.id));
        title.kind = data.kind.and_then(|k| Kind::from_site_name(&k.name));
        title.status = data.status.and_then(|s| Status::from_site_name(&s.name));
        title.is_licensed = data.is_licensed;
        title.genres = data.genres.into_iter().map(|g| g.name).collect();
        title.tags = data.categories.into_iter().map(|c| c.name).collect();
        title.persons = self.persons(data.id).await?;
        title.branches = self.branches(&data.branches).await?;

        Ok(Some(title))
    }

    async fn covers(&mut self, slug: &str, data: &CoverData) -> Result<Vec<Cover>, ParserError> {
        let mut covers = Vec::new();
        let download = self.settings.common.sizing_images || self.settings.custom.unstub;

        for uri in [&data.high, &data.mid, &data.low].into_iter().flatten() {
            if uri == EMPTY_COVER {
                continue;
            }
            let mut cover = Cover {
                link: format!("https://{}{uri}", self.settings.site),
                filename: uri.rsplit('/').next().unwrap_or_default().to_string(),
                width: None,
                height: None,
            };

            let downloaded = if download {
                self.download_cover(&cover.link).await?
            } else {
                None
            };
            let Some(path) = downloaded else {
                covers.push(cover);
                continue;
            };

            if self.settings.common.sizing_images {
                if let Some((width, height)) = image_dimensions(&path) {
                    cover.width = Some(width);
                    cover.height = Some(height);
                }
            }
            covers.push(cover);

            if self.settings.custom.unstub && self.is_stub(&path) {
                covers.clear();
                self.portals.covers_unstubbed(slug);
                break;
            }
        }

        Ok(covers)
    }

    fn is_stub(&self, cover: &Path) -> bool {
        match self.detector.is_stub(cover, &self.filters, &self.portals) {
            Ok(stub) => stub,
            Err(e) => {
                let message = format!("Problem occurred during filtering stubs: \"{e}\".");
                self.portals.error(&message);
                false
            }
        }
    }

    async fn download_cover(&mut self, link: &str) -> Result<Option<PathBuf>, ParserError> {
        let response = self.get(link.to_string()).await?;
        if !response.is_success() {
            self.portals
                .request_error(response.status(), "Unable to download cover.");
            return Ok(None);
        }
        let path = self.cover_path();
        if let Err(e) = fs::write(&path, response.body()) {
            let message = format!("Unable to save cover: \"{e}\".");
            self.portals.error(&message);
            return Ok(None);
        }
        debug!("Cover saved to {}", path.display());
        Ok(Some(path))
    }

    async fn persons(&mut self, id: u64) -> Result<Vec<Person>, ParserError> {
        let site = self.settings.site.clone();
        let url = format!("https://{site}/api/v2/titles/{id}/characters/?");
        let response = self.get(url).await?;
        if !response.is_success() {
            return Ok(Vec::new());
        }
        let characters: Vec<CharacterData> = response.json()?;

        Ok(characters
            .into_iter()
            .map(|character| Person {
                name: character.name,
                another_names: character
                    .alt_name
                    .filter(|name| !name.is_empty())
                    .into_iter()
                    .collect(),
                images: character
                    .cover
                    .map(|cover| {
                        vec![
                            format!("https://{site}/media/{}", cover.high),
                            format!("https://{site}/media/{}", cover.mid),
                        ]
                    })
                    .unwrap_or_default(),
                description: character.description.as_deref().map(html_to_text),
            })
            .collect())
    }

    async fn branches(&mut self, branches: &[BranchData]) -> Result<Vec<Branch>, ParserError> {
        let mut result = Vec::with_capacity(branches.len());
        for data in branches {
            let mut branch = Branch::new(data.id);
            for page in 1..=data.count_chapters.div_ceil(CHAPTERS_PER_PAGE) {
                let url = format!(
                    "https://{}/api/v2/titles/chapters/?branch_id={}&ordering=-index&page={page}",
                    self.settings.site, data.id
                );
                let response = self.get(url).await?;
                if !response.is_success() {
                    self.portals
                        .request_error(response.status(), "Unable to request chapter.");
                    continue;
                }
                let notes: Page<ChapterNote> = response.json()?;
                for note in notes.results {
                    branch.chapters.push(self.chapter(note)?);
                }
            }
            result.push(branch);
        }
        Ok(result)
    }

    fn chapter(&self, note: ChapterNote) -> Result<Chapter, ParserError> {
        let mut extra = BTreeMap::new();
        if self.settings.custom.add_free_publication_date && note.is_paid {
            if let Some(date) = note.pub_date {
                extra.insert(String::from("free-publication-date"), date);
            }
        }
        let workers: Vec<String> = note.publishers.into_iter().map(|p| p.name).collect();
        Ok(ChapterBuilder::default()
            .id(note.id)
            .volume(note.tome)
            .number(note.chapter)
            .name(note.name.filter(|name| name != "null"))
            .is_paid(note.is_paid)
            .workers(workers)
            .extra(extra)
            .build()?)
    }

    /// Fills a chapter with its slides.
    ///
    /// Once the site refuses a paid chapter, every later paid chapter is
    /// skipped without a request.
    #[instrument(skip(self, chapter), fields(chapter_id = chapter.id))]
    pub async fn amend(&mut self, slug: &str, chapter: &mut Chapter) -> Result<(), ParserError> {
        if chapter.is_paid && self.paid_chapters_locked {
            self.portals.chapter_skipped(slug, chapter.id);
            return Ok(());
        }

        let url = format!(
            "https://{}/api/v2/titles/chapters/{}/",
            self.settings.site, chapter.id
        );
        let response = self.get(url).await?;
        match response.status() {
            200 => {
                let content: ChapterContent = response.json()?;
                for page in content.pages.flatten() {
                    let link = if self.settings.custom.ru_links {
                        rusificate_link(&page.link)
                    } else {
                        page.link
                    };
                    chapter.add_slide(link, page.width, page.height);
                }
            }
            401 | 423 => {
                if chapter.is_paid {
                    self.paid_chapters_locked = true;
                }
                self.portals.chapter_skipped(slug, chapter.id);
            }
            status => {
                let message = "Unable to request chapter content.";
                self.portals.request_error(status, message);
            }
        }
        Ok(())
    }

    pub async fn amend_title(&mut self, title: &mut Title) -> Result<(), ParserError> {
        let slug = title.slug.clone();
        for branch in title.branches_mut() {
            for chapter in branch.chapters_mut() {
                self.amend(&slug, chapter).await?;
            }
        }
        Ok(())
    }
}

fn image_dimensions(path: &Path) -> Option<(u32, u32)> {
    ImageReader::open(path)
        .ok()?
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Reads an upload timestamp as wall-clock time, discarding any offset.
fn parse_upload_date(date: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(date)
        .map(|d| d.naive_local())
        .or_else(|_| NaiveDateTime::parse_from_str(date, ISO_FORMAT))
        .or_else(|_| NaiveDateTime::parse_from_str(date, SPACED_FORMAT))
        .ok()
}

/// Extracts the title slug from a link like `https://remanga.org/manga/<slug>`.
pub fn slug_from_url(
    url: impl IntoUrl + Clone + ToString,
    site: &str,
) -> Result<String, ParserError> {
    let url = url
        .clone()
        .into_url()
        .map_err(|_e| ParserError::UrlParseError(url.to_string()))?;
    let domain = url.domain().unwrap_or_default();
    if domain != site && domain.strip_prefix("www.") != Some(site) {
        return Err(ParserError::UrlParseError(url.to_string()));
    }
    let mut segments = url
        .path_segments()
        .ok_or_else(|| ParserError::UrlParseError(url.to_string()))?;
    match (segments.next(), segments.next()) {
        (Some("manga"), Some(slug)) if !slug.is_empty() => Ok(slug.to_string()),
        _ => Err(ParserError::UrlParseError(url.to_string())),
    }
}
