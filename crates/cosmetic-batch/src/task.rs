//! One sub-image of one target, from load to write.

use crate::{BatchError, BatchResult};
use cosmetic_core::Image;
use cosmetic_io::{FrameWriter, IccProfile, ImageCodec, ImageOptions, IoError, IoResult, Keyword};
use cosmetic_ops::{AutoDetect, CancelToken, CorrectionPlan, DefectItem, Layout, OpsError, ReferenceMaps, list_map};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Tool name and version recorded in output headers.
pub const TOOL_VERSION: &str = concat!("cosmetic ", env!("CARGO_PKG_VERSION"));

/// A sub-image with the metadata it is written back with.
#[derive(Debug, Clone)]
pub struct Task {
    /// Source file.
    pub source: PathBuf,
    /// Sub-image index within the source.
    pub index: usize,
    /// Pixels, corrected in place.
    pub image: Image,
    /// Source keywords.
    pub keywords: Vec<Keyword>,
    /// Source color profile.
    pub icc: Option<IccProfile>,
    /// Source storage options.
    pub options: ImageOptions,
    /// Source format-specific data.
    pub format_data: Option<Vec<u8>>,
}

impl Task {
    /// Source keywords plus the processing history of this run.
    pub fn output_keywords(&self, corrected: usize) -> Vec<Keyword> {
        let mut keywords = self.keywords.clone();
        keywords.push(Keyword::comment(format!("CosmeticCorrection with {}", TOOL_VERSION)));
        keywords.push(Keyword::history(TOOL_VERSION));
        keywords.push(Keyword::history(format!(
            "CosmeticCorrection. Total corrected pixels {}",
            corrected
        )));
        keywords
    }
}

/// Reads every sub-image of `path`, in ascending order.
///
/// Any failure, including a file without images, is an item error.
pub fn load_tasks(codec: &dyn ImageCodec, path: &Path) -> BatchResult<Vec<Task>> {
    let skip = |e: IoError| BatchError::item(path, e.to_string());

    let mut reader = codec.open(path).map_err(skip)?;
    let descriptors = reader.images().to_vec();
    if descriptors.is_empty() {
        return Err(BatchError::item(path, "file contains no images"));
    }

    let mut tasks = Vec::with_capacity(descriptors.len());
    for (index, desc) in descriptors.iter().enumerate() {
        reader.select(index).map_err(skip)?;
        let image = reader.read().map_err(skip)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(BatchError::item(path, format!("sub-image {} is empty", index)));
        }
        debug!(path = %path.display(), index, id = %desc.id, width = desc.width, height = desc.height, "Sub-image loaded");
        tasks.push(Task {
            source: path.to_path_buf(),
            index,
            image,
            keywords: reader.read_keywords().map_err(skip)?,
            icc: reader.read_icc_profile().map_err(skip)?,
            options: desc.options,
            format_data: reader.format_specific_data().map_err(skip)?,
        });
    }
    reader.close().map_err(skip)?;
    Ok(tasks)
}

/// Creates `path` and writes `task` with the run history appended.
///
/// On failure the partially written file is removed.
pub fn write_task(codec: &dyn ImageCodec, path: &Path, task: &Task, corrected: usize) -> IoResult<()> {
    let result = codec.create(path).and_then(|mut writer| {
        write_frame(writer.as_mut(), task, corrected)?;
        writer.close()
    });
    if let Err(e) = result {
        if codec.exists(path) {
            if let Err(remove) = codec.remove(path) {
                debug!(path = %path.display(), error = %remove, "Could not remove partial output");
            }
        }
        return Err(e);
    }
    info!(path = %path.display(), corrected, "Output written");
    Ok(())
}

fn write_frame(writer: &mut dyn FrameWriter, task: &Task, corrected: usize) -> IoResult<()> {
    writer.set_options(&task.options)?;
    if let Some(data) = &task.format_data {
        writer.set_format_specific_data(data)?;
    }
    writer.write_keywords(&task.output_keywords(corrected))?;
    if let Some(icc) = &task.icc {
        writer.write_icc_profile(icc)?;
    }
    writer.write_image(&task.image)
}

/// Settings shared read-only by every task of a run.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Sensor layout.
    pub layout: Layout,
    /// Blend factor.
    pub amount: f32,
    /// Calibration maps.
    pub reference: Option<ReferenceMaps>,
    /// Auto-detect multipliers.
    pub auto: AutoDetect,
    /// Explicit defects.
    pub defects: Option<Vec<DefectItem>>,
}

impl TaskContext {
    /// Detects and corrects defects of `task` in place.
    ///
    /// Returns the number of corrected samples. Panics inside detection are
    /// caught and reported as [`BatchError::Task`].
    pub fn execute(&self, task: &mut Task, cancel: &CancelToken) -> BatchResult<usize> {
        match catch_unwind(AssertUnwindSafe(|| self.correct(&mut task.image, cancel))) {
            Ok(Ok(count)) => Ok(count),
            Ok(Err(OpsError::Aborted)) => Err(BatchError::Ops(OpsError::Aborted)),
            Ok(Err(e)) => Err(BatchError::Task(e.to_string())),
            Err(payload) => Err(BatchError::Task(format!("panicked: {}", panic_message(&*payload)))),
        }
    }

    fn correct(&self, image: &mut Image, cancel: &CancelToken) -> Result<usize, OpsError> {
        let list = self
            .defects
            .as_deref()
            .map(|items| list_map(image.width(), image.height(), items))
            .transpose()?;
        let plan = CorrectionPlan {
            reference: self.reference.as_ref(),
            auto: self.auto,
            list: list.as_ref(),
            ..CorrectionPlan::new(self.layout, self.amount)
        };
        plan.run(image, cancel)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmetic_io::{MemoryCodec, MemoryPage};

    fn context() -> TaskContext {
        TaskContext {
            layout: Layout::Plain,
            amount: 1.0,
            reference: None,
            auto: AutoDetect::default(),
            defects: Some(vec![DefectItem::column(1)]),
        }
    }

    #[test]
    fn test_load_every_subimage() {
        let codec = MemoryCodec::new();
        codec.insert(
            "a.tif",
            vec![
                MemoryPage::new(Image::filled(4, 4, 1, 0.1).unwrap()),
                MemoryPage::new(Image::filled(4, 4, 3, 0.2).unwrap())
                    .with_keywords(vec![Keyword::new("EXPTIME", "30", "")]),
            ],
        );
        let tasks = load_tasks(&codec, Path::new("a.tif")).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].index, 1);
        assert_eq!(tasks[1].image.channels(), 3);
        assert_eq!(tasks[1].keywords.len(), 1);
    }

    #[test]
    fn test_load_failures_are_item_errors() {
        let codec = MemoryCodec::new();
        assert!(matches!(
            load_tasks(&codec, Path::new("missing.tif")),
            Err(BatchError::Item { .. })
        ));
        codec.insert("empty.tif", Vec::new());
        assert!(matches!(
            load_tasks(&codec, Path::new("empty.tif")),
            Err(BatchError::Item { .. })
        ));
        codec.insert_image("bad.tif", Image::filled(2, 2, 1, 0.0).unwrap());
        codec.fail_reads("bad.tif");
        assert!(load_tasks(&codec, Path::new("bad.tif")).is_err());
    }

    #[test]
    fn test_history_keywords() {
        let codec = MemoryCodec::new();
        codec.insert_image("a.tif", Image::filled(4, 4, 1, 0.1).unwrap());
        let mut task = load_tasks(&codec, Path::new("a.tif")).unwrap().remove(0);
        let n = context().execute(&mut task, &CancelToken::new()).unwrap();
        assert_eq!(n, 4);

        write_task(&codec, Path::new("a_cc.tif"), &task, n).unwrap();
        let page = codec.get(Path::new("a_cc.tif")).unwrap().remove(0);
        let cards: Vec<String> = page.keywords.iter().map(Keyword::to_card).collect();
        assert_eq!(cards[0], format!("COMMENT CosmeticCorrection with {}", TOOL_VERSION));
        assert_eq!(cards[2], "HISTORY CosmeticCorrection. Total corrected pixels 4");
    }

    #[test]
    fn test_failed_write_leaves_nothing() {
        let codec = MemoryCodec::new();
        codec.fail_writes("out.tif");
        let task = Task {
            source: "a.tif".into(),
            index: 0,
            image: Image::filled(2, 2, 1, 0.0).unwrap(),
            keywords: Vec::new(),
            icc: None,
            options: ImageOptions::default(),
            format_data: None,
        };
        assert!(write_task(&codec, Path::new("out.tif"), &task, 0).is_err());
        assert!(!codec.exists(Path::new("out.tif")));
    }

    #[test]
    fn test_canceled_task_reports_abort() {
        let token = CancelToken::new();
        token.cancel();
        let mut task = Task {
            source: "a.tif".into(),
            index: 0,
            image: Image::filled(8, 8, 1, 0.0).unwrap(),
            keywords: Vec::new(),
            icc: None,
            options: ImageOptions::default(),
            format_data: None,
        };
        let res = context().execute(&mut task, &token);
        assert!(matches!(res, Err(BatchError::Ops(OpsError::Aborted))));
    }
}
