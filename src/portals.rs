use tracing::{error, info, warn};

/// Progress and problem reporting for a parsing session.
///
/// Nothing reported here changes control flow; the connector keeps going
/// after every call.
pub trait Portals {
    fn request_error(&self, status: u16, message: &str);
    fn title_not_found(&self, slug: &str);
    fn chapter_skipped(&self, slug: &str, chapter_id: u64);
    fn covers_unstubbed(&self, slug: &str);
    fn collect_progress_by_page(&self, page: u32);
    fn error(&self, message: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogPortals;

impl Portals for LogPortals {
    fn request_error(&self, status: u16, message: &str) {
        error!(status, "{message}");
    }

    fn title_not_found(&self, slug: &str) {
        warn!(slug, "title not found");
    }

    fn chapter_skipped(&self, slug: &str, chapter_id: u64) {
        info!(slug, chapter_id, "chapter skipped");
    }

    fn covers_unstubbed(&self, slug: &str) {
        info!(slug, "covers were stubs and have been removed");
    }

    fn collect_progress_by_page(&self, page: u32) {
        info!(page, "collected page");
    }

    fn error(&self, message: &str) {
        error!("{message}");
    }
}

impl<T: Portals + ?Sized> Portals for &T {
    fn request_error(&self, status: u16, message: &str) {
        (**self).request_error(status, message)
    }

    fn title_not_found(&self, slug: &str) {
        (**self).title_not_found(slug)
    }

    fn chapter_skipped(&self, slug: &str, chapter_id: u64) {
        (**self).chapter_skipped(slug, chapter_id)
    }

    fn covers_unstubbed(&self, slug: &str) {
        (**self).covers_unstubbed(slug)
    }

    fn collect_progress_by_page(&self, page: u32) {
        (**self).collect_progress_by_page(page)
    }

    fn error(&self, message: &str) {
        (**self).error(message)
    }
}
