use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::codec;
use crate::domain::{ColumnConfig, FixConfig, FixError, HELP_TEXT, Message};
use crate::images;
use crate::pager::Pager;
use crate::store::RecordStore;
use crate::ui::{Prompter, Renderer, RowView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Empty,
    Ready,
    Quitting,
}

/// Routes user intents to the record store, pager and image resolver, in an
/// order that never lets the pager address rows the store no longer has.
/// The presenter is also the only layer that talks to the user: errors from
/// below are turned into notifications here and nowhere else.
pub struct Presenter<R: Renderer, P: Prompter> {
    store: RecordStore,
    pager: Pager,
    renderer: R,
    prompter: P,
    status: Status,
}

impl<R: Renderer, P: Prompter> Presenter<R, P> {
    pub fn new(config: FixConfig, renderer: R, prompter: P) -> Result<Self, FixError> {
        let pager = Pager::new(config.page_size)?;
        let store = RecordStore::new(config.columns);
        info!("Presenter initialized");
        Ok(Presenter {
            store,
            pager,
            renderer,
            prompter,
            status: Status::Empty,
        })
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    /// Handle one user intent. Recoverable failures are reported through the
    /// prompter and leave all state as it was.
    pub fn update(&mut self, message: Message) {
        debug!("Presenter received {:?}", message);
        if let Err(err) = self.dispatch(message) {
            warn!("Operation failed: {err}");
            self.prompter.notify(&err.to_string());
        }
    }

    fn dispatch(&mut self, message: Message) -> Result<(), FixError> {
        match message {
            Message::OpenFile(path) => self.open_file(path),
            Message::SaveFile(path) => self.save_file(path),
            Message::NextPage => self.navigate(|pager| pager.next_page()),
            Message::PrevPage => self.navigate(|pager| pager.prev_page()),
            Message::GoToPage(page) => self.navigate(|pager| pager.go_to_page(page)),
            Message::GoToRecord(index) => self.navigate(|pager| pager.go_to_index(index)),
            Message::SetPageSize(size) => self.set_page_size(size),
            Message::EditText(index, text) => self.edit_text(index, text),
            Message::DeleteRecord(index) => self.delete_record(index),
            Message::RotateImage(index) => self.rotate_image(index),
            Message::SortBy(column, ascending) => self.sort_by(&column, ascending),
            Message::SelectColumns => self.select_columns(),
            Message::Refresh => self.render_visible(),
            Message::Help => {
                self.prompter.notify(HELP_TEXT);
                Ok(())
            }
            Message::Quit => {
                self.status = Status::Quitting;
                Ok(())
            }
        }
    }

    // Paths are normalized before the pager learns the new row count, so a
    // render triggered by the pager can never see an unnormalized path.
    fn open_file(&mut self, path: Option<PathBuf>) -> Result<(), FixError> {
        let Some(path) = path.or_else(|| self.prompter.prompt_for_file()) else {
            return Ok(());
        };

        let frame = codec::load(&path)?;
        let names: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        let config = match self.prompter.prompt_column_selection(&names) {
            Some((path_column, text_column)) => ColumnConfig {
                path_column,
                text_column,
            },
            None => self.store.config().clone(),
        };

        let rows = self.store.load(&frame, &path, &config)?;
        let base = path.parent().unwrap_or(Path::new("."));
        self.store.normalize_paths(base)?;

        let missing = self.store.missing_paths()?;
        if !missing.is_empty() {
            self.prompter.notify(&format!(
                "{} of {} records point to missing image files",
                missing.len(),
                rows
            ));
        }

        self.pager.reset(rows);
        self.status = Status::Ready;
        self.prompter
            .notify(&format!("loaded {} records from {}", rows, path.display()));
        self.render_visible()
    }

    // Saving serializes the in-memory table as it stands; the label file on
    // disk is never consulted.
    fn save_file(&mut self, path: Option<PathBuf>) -> Result<(), FixError> {
        self.require_loaded()?;
        let target = match path {
            Some(path) => path,
            None => {
                let source = self
                    .store
                    .source()
                    .ok_or_else(|| FixError::Validation("no label file loaded".to_string()))?;
                let suggested = codec::default_save_name(source)?;
                match self.prompter.prompt_for_save_path(&suggested) {
                    Some(path) => path,
                    None => return Ok(()),
                }
            }
        };
        self.store.save(&target)?;
        self.prompter.notify(&format!(
            "saved {} records to {}",
            self.store.row_count(),
            target.display()
        ));
        Ok(())
    }

    fn navigate(&mut self, op: impl FnOnce(&mut Pager) -> bool) -> Result<(), FixError> {
        self.require_loaded()?;
        if op(&mut self.pager) {
            self.notify_page();
            self.render_visible()?;
        }
        Ok(())
    }

    fn set_page_size(&mut self, size: usize) -> Result<(), FixError> {
        if self.pager.set_items_per_page(size)? {
            self.prompter.notify(&format!(
                "{} records per page, page {}/{}",
                self.pager.items_per_page(),
                self.pager.current_page(),
                self.pager.total_pages()
            ));
            self.render_visible()?;
        }
        Ok(())
    }

    fn edit_text(&mut self, index: usize, text: String) -> Result<(), FixError> {
        self.require_loaded()?;
        let previous = self.store.get_text(index)?.to_string();
        self.store.change_text(index, text.clone())?;
        self.prompter
            .notify(&format!("text change from {previous:?} to {text:?}"));
        // Row count unchanged, the pager stays untouched.
        self.render_visible()
    }

    // Store and pager are told the same pre-deletion index; the pager only
    // repartitions after the store has actually shrunk.
    fn delete_record(&mut self, index: usize) -> Result<(), FixError> {
        self.require_loaded()?;
        if index >= self.store.row_count() {
            return Err(FixError::IndexOutOfRange {
                index,
                len: self.store.row_count(),
            });
        }
        let question = format!(
            "delete record {index} ({})",
            self.store.get_path(index)?.display()
        );
        if !self.prompter.confirm(&question) {
            return Ok(());
        }

        self.store.delete(index)?;
        self.pager.remove_index(index)?;
        debug_assert_eq!(self.pager.total_items(), self.store.row_count());
        self.render_visible()
    }

    // Rotation is persisted back to the image file, like the original
    // annotator workflow expects; the table itself is untouched.
    fn rotate_image(&mut self, index: usize) -> Result<(), FixError> {
        self.require_loaded()?;
        let path = self.store.get_path(index)?;
        let image = images::open(&path)?;
        let rotated = images::rotate(&image, 90)?;
        rotated.save(&path)?;
        info!("Rotated {} by 90 degrees", path.display());
        self.render_visible()
    }

    fn sort_by(&mut self, column: &str, ascending: bool) -> Result<(), FixError> {
        self.require_loaded()?;
        self.store.sort_by(column, ascending)?;
        // Order changed under the partition; show the table from the top.
        self.pager.go_to_page(1);
        self.prompter.notify(&format!(
            "sorted by {:?} ({})",
            column,
            if ascending { "ascending" } else { "descending" }
        ));
        self.render_visible()
    }

    fn select_columns(&mut self) -> Result<(), FixError> {
        self.require_loaded()?;
        let names = self.store.column_names();
        let Some((path_column, text_column)) = self.prompter.prompt_column_selection(&names)
        else {
            return Ok(());
        };
        self.store.set_path_column(&path_column)?;
        self.store.set_text_column(&text_column)?;
        self.render_visible()
    }

    /// Read the pager's visible rows back out of the store and hand them to
    /// the renderer. Image decoding failures stay per-row.
    fn render_visible(&mut self) -> Result<(), FixError> {
        let mut rows = Vec::new();
        for index in self.pager.visible_indices() {
            let path = self.store.get_path(index)?;
            let text = self.store.get_text(index)?.to_string();
            let image = images::open(&path);
            rows.push(RowView {
                index,
                path,
                image,
                text,
            });
        }
        debug!(
            "Rendering {} rows, page {}/{}",
            rows.len(),
            self.pager.current_page(),
            self.pager.total_pages()
        );
        self.renderer.display_rows(&rows);
        Ok(())
    }

    fn notify_page(&mut self) {
        self.prompter.notify(&format!(
            "page {}/{}",
            self.pager.current_page(),
            self.pager.total_pages()
        ));
    }

    fn require_loaded(&self) -> Result<(), FixError> {
        if !self.store.is_loaded() {
            return Err(FixError::Validation(
                "no label file loaded, use `o <file>` first".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecorderState {
        pages: Vec<Vec<(usize, String, bool)>>, // (index, text, image decoded)
        notices: Vec<String>,
        confirm_answer: bool,
        columns: Option<(String, String)>,
        save_path_override: Option<PathBuf>,
    }

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<RecorderState>>);

    impl Renderer for Recorder {
        fn display_rows(&mut self, rows: &[RowView]) {
            let page = rows
                .iter()
                .map(|r| (r.index, r.text.clone(), r.image.is_ok()))
                .collect();
            self.0.borrow_mut().pages.push(page);
        }
    }

    impl Prompter for Recorder {
        fn prompt_for_file(&mut self) -> Option<PathBuf> {
            None
        }

        fn prompt_for_save_path(&mut self, suggested: &Path) -> Option<PathBuf> {
            let state = self.0.borrow();
            Some(
                state
                    .save_path_override
                    .clone()
                    .unwrap_or_else(|| suggested.to_path_buf()),
            )
        }

        fn prompt_column_selection(&mut self, _names: &[String]) -> Option<(String, String)> {
            self.0.borrow().columns.clone()
        }

        fn confirm(&mut self, _question: &str) -> bool {
            self.0.borrow().confirm_answer
        }

        fn notify(&mut self, message: &str) {
            self.0.borrow_mut().notices.push(message.to_string());
        }
    }

    fn write_labels(dir: &Path, name: &str, rows: &[(&str, &str)]) -> PathBuf {
        let path = dir.join(name);
        let mut content = String::from("path,text\n");
        for (p, t) in rows {
            content.push_str(&format!("{p},{t}\n"));
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn presenter(page_size: usize) -> (Presenter<Recorder, Recorder>, Recorder) {
        let recorder = Recorder::default();
        let config = FixConfig {
            columns: ColumnConfig::default(),
            page_size,
        };
        let presenter =
            Presenter::new(config, recorder.clone(), recorder.clone()).unwrap();
        (presenter, recorder)
    }

    #[test]
    fn load_renders_the_first_page() {
        let dir = tempfile::tempdir().unwrap();
        let labels = write_labels(
            dir.path(),
            "labels.csv",
            &[("a.jpg", "alpha"), ("b.jpg", "beta"), ("c.jpg", "gamma")],
        );
        let (mut presenter, recorder) = presenter(2);

        presenter.update(Message::OpenFile(Some(labels)));

        assert_eq!(presenter.status(), Status::Ready);
        assert_eq!(presenter.pager().total_pages(), 2);
        let state = recorder.0.borrow();
        let page = state.pages.last().unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].0, 0);
        assert_eq!(page[0].1, "alpha");
        // The stub files do not exist, so decoding failed per-row.
        assert!(!page[0].2);
        assert!(state.notices.iter().any(|n| n.contains("missing image files")));
    }

    #[test]
    fn delete_on_last_page_clamps_and_rerenders() {
        let dir = tempfile::tempdir().unwrap();
        let labels = write_labels(
            dir.path(),
            "labels.csv",
            &[("a.jpg", "alpha"), ("b.jpg", "beta"), ("c.jpg", "gamma")],
        );
        let (mut presenter, recorder) = presenter(2);
        recorder.0.borrow_mut().confirm_answer = true;

        presenter.update(Message::OpenFile(Some(labels)));
        presenter.update(Message::NextPage);
        presenter.update(Message::DeleteRecord(1));

        assert_eq!(presenter.store().row_count(), 2);
        assert_eq!(presenter.pager().total_pages(), 1);
        assert_eq!(presenter.pager().current_page(), 1);
        let state = recorder.0.borrow();
        let page = state.pages.last().unwrap();
        assert_eq!(page.iter().map(|r| r.0).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(page[1].1, "gamma");
    }

    #[test]
    fn declined_confirmation_leaves_everything_intact() {
        let dir = tempfile::tempdir().unwrap();
        let labels =
            write_labels(dir.path(), "labels.csv", &[("a.jpg", "alpha"), ("b.jpg", "beta")]);
        let (mut presenter, recorder) = presenter(2);
        recorder.0.borrow_mut().confirm_answer = false;

        presenter.update(Message::OpenFile(Some(labels)));
        presenter.update(Message::DeleteRecord(0));

        assert_eq!(presenter.store().row_count(), 2);
        assert_eq!(presenter.pager().total_items(), 2);
    }

    #[test]
    fn edit_changes_text_without_touching_the_pager() {
        let dir = tempfile::tempdir().unwrap();
        let labels =
            write_labels(dir.path(), "labels.csv", &[("a.jpg", "alpha"), ("b.jpg", "beta")]);
        let (mut presenter, recorder) = presenter(2);

        presenter.update(Message::OpenFile(Some(labels)));
        presenter.update(Message::EditText(0, "hello".to_string()));

        assert_eq!(presenter.store().get_text(0).unwrap(), "hello");
        assert_eq!(presenter.store().row_count(), 2);
        assert_eq!(presenter.pager().current_page(), 1);
        assert_eq!(presenter.pager().total_items(), 2);
        let state = recorder.0.borrow();
        assert!(state.notices.iter().any(|n| n.contains("text change")));
    }

    #[test]
    fn save_writes_current_state_to_the_chosen_path() {
        let dir = tempfile::tempdir().unwrap();
        let labels =
            write_labels(dir.path(), "labels.csv", &[("a.jpg", "alpha"), ("b.jpg", "beta")]);
        let target = dir.path().join("corrected.csv");
        let (mut presenter, recorder) = presenter(2);
        recorder.0.borrow_mut().confirm_answer = true;
        recorder.0.borrow_mut().save_path_override = Some(target.clone());

        presenter.update(Message::OpenFile(Some(labels)));
        presenter.update(Message::EditText(1, "fixed".to_string()));
        presenter.update(Message::SaveFile(None));

        let written = fs::read_to_string(&target).unwrap();
        assert!(written.starts_with("path,text"));
        assert!(written.contains("fixed"));
        assert!(!written.contains("beta"));
    }

    #[test]
    fn operations_without_a_table_only_notify() {
        let (mut presenter, recorder) = presenter(2);
        presenter.update(Message::NextPage);
        presenter.update(Message::EditText(0, "x".to_string()));
        presenter.update(Message::SaveFile(None));

        assert_eq!(presenter.status(), Status::Empty);
        let state = recorder.0.borrow();
        assert_eq!(state.pages.len(), 0);
        assert!(!state.notices.is_empty());
    }

    #[test]
    fn failed_load_keeps_the_previous_table() {
        let dir = tempfile::tempdir().unwrap();
        let good =
            write_labels(dir.path(), "labels.csv", &[("a.jpg", "alpha"), ("b.jpg", "beta")]);
        let bad = dir.path().join("broken.csv");
        fs::write(&bad, "image,transcript\nx.jpg,hi\n").unwrap();

        let (mut presenter, _recorder) = presenter(2);
        presenter.update(Message::OpenFile(Some(good)));
        assert_eq!(presenter.store().row_count(), 2);

        // Columns "path"/"text" are missing from the second file.
        presenter.update(Message::OpenFile(Some(bad)));
        assert_eq!(presenter.store().row_count(), 2);
        assert_eq!(presenter.pager().total_items(), 2);
        assert_eq!(presenter.store().config().path_column, "path");
    }

    #[test]
    fn column_selection_rebinds_text_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.csv");
        fs::write(&path, "path,text,alt\na.jpg,alpha,other\n").unwrap();

        let (mut presenter, recorder) = presenter(2);
        presenter.update(Message::OpenFile(Some(path)));
        recorder.0.borrow_mut().columns = Some(("path".to_string(), "alt".to_string()));
        presenter.update(Message::SelectColumns);

        assert_eq!(presenter.store().get_text(0).unwrap(), "other");
    }

    #[test]
    fn rotate_persists_the_turned_image() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("a.png");
        image::DynamicImage::ImageRgb8(image::RgbImage::new(4, 2))
            .save(&image_path)
            .unwrap();
        let labels = write_labels(dir.path(), "labels.csv", &[("a.png", "alpha")]);

        let (mut presenter, _recorder) = presenter(2);
        presenter.update(Message::OpenFile(Some(labels)));
        presenter.update(Message::RotateImage(0));

        let rotated = image::ImageReader::open(&image_path).unwrap().decode().unwrap();
        assert_eq!((rotated.width(), rotated.height()), (2, 4));
    }
}
