/// Sequence numbering shared by the rename engine and the materializer

use std::path::Path;

use crate::config::{SortOrder, CAPTION_EXTENSION};
use crate::error::{DatasetError, Result};

/// Number assignment for one sorted list of images
///
/// Numbers always follow the ascending file name order: the i-th file in
/// ascending order gets `start + i`, or `start + total - 1 - i` when the
/// order is descending. Descending runs also walk the files back to front,
/// which decides what gets paired when image and caption counts differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Numbering {
    order: SortOrder,
    effective_start: i64,
    total: usize,
}

impl Numbering {
    /// Put `files` (sorted ascending by name) in processing order and
    /// compute the numbering for them
    ///
    /// # Returns
    /// * `Err(DatasetError::Config)` - `start..start + len` does not fit in an `i64`
    pub fn arrange<T>(files: &mut [T], start: i64, order: SortOrder) -> Result<Self> {
        let total = files.len();
        let last = last_number(start, total)?;
        let effective_start = match order {
            SortOrder::Ascending => start,
            SortOrder::Descending => {
                files.reverse();
                last
            }
        };

        Ok(Numbering {
            order,
            effective_start,
            total,
        })
    }

    /// First number of the sequence in ascending order, highest in descending
    pub fn effective_start(&self) -> i64 {
        self.effective_start
    }

    /// Number of the file at `position` in processing order
    ///
    /// Every result lies in the range checked by `arrange`.
    pub fn number_at(&self, position: usize) -> i64 {
        match self.order {
            SortOrder::Ascending => self.effective_start + position as i64,
            SortOrder::Descending => {
                // position counts from the back of the ascending list
                let ascending_index = (self.total - 1 - position) as i64;
                self.effective_start - ascending_index
            }
        }
    }
}

/// Highest number of a run of `total` files from `start`
fn last_number(start: i64, total: usize) -> Result<i64> {
    let span = i64::try_from(total.saturating_sub(1)).ok();
    span.and_then(|span| start.checked_add(span)).ok_or_else(|| {
        DatasetError::Config(format!(
            "{} files starting at {} run past the largest sequence number",
            total, start
        ))
    })
}

/// `{prefix}_{NNNN}{ext}` keeping the source extension as written
pub fn image_name(prefix: &str, number: i64, source: &Path) -> String {
    let ext = source
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    format!("{}_{:04}{}", prefix, number, ext)
}

/// `{prefix}_{NNNN}.txt`
pub fn caption_name(prefix: &str, number: i64) -> String {
    format!("{}_{:04}.{}", prefix, number, CAPTION_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascending_numbers_count_up_from_start() {
        let mut files = vec!["a", "b", "c"];
        let numbering = Numbering::arrange(&mut files, 5, SortOrder::Ascending).unwrap();
        assert_eq!(files, ["a", "b", "c"]);
        let numbers: Vec<i64> = (0..3).map(|i| numbering.number_at(i)).collect();
        assert_eq!(numbers, [5, 6, 7]);
    }

    #[test]
    fn descending_gives_first_file_the_highest_number() {
        let mut files = vec!["a", "b", "c"];
        let numbering = Numbering::arrange(&mut files, 1, SortOrder::Descending).unwrap();
        assert_eq!(numbering.effective_start(), 3);
        assert_eq!(files, ["c", "b", "a"]);
        let numbers: Vec<i64> = (0..3).map(|i| numbering.number_at(i)).collect();
        // c -> 1, b -> 2, a -> 3
        assert_eq!(numbers, [1, 2, 3]);
    }

    #[test]
    fn descending_two_files_from_one() {
        let mut files = vec!["a.jpg", "b.jpg"];
        let numbering = Numbering::arrange(&mut files, 1, SortOrder::Descending).unwrap();
        assert_eq!(numbering.effective_start(), 2);
        // files is now [b, a]
        assert_eq!((files[0], numbering.number_at(0)), ("b.jpg", 1));
        assert_eq!((files[1], numbering.number_at(1)), ("a.jpg", 2));
    }

    #[test]
    fn start_near_the_top_of_the_range_is_refused() {
        let mut files = vec!["a.jpg", "b.jpg"];
        assert!(matches!(
            Numbering::arrange(&mut files, i64::MAX, SortOrder::Descending),
            Err(DatasetError::Config(_))
        ));
        assert!(matches!(
            Numbering::arrange(&mut files, i64::MAX, SortOrder::Ascending),
            Err(DatasetError::Config(_))
        ));
        // Nothing was reordered for the refused run
        assert_eq!(files, ["a.jpg", "b.jpg"]);
    }

    #[test]
    fn extreme_starts_that_fit_are_accepted() {
        let mut one = vec!["a.jpg"];
        let numbering = Numbering::arrange(&mut one, i64::MAX, SortOrder::Descending).unwrap();
        assert_eq!(numbering.number_at(0), i64::MAX);

        let mut two = vec!["a.jpg", "b.jpg"];
        let numbering = Numbering::arrange(&mut two, i64::MIN, SortOrder::Descending).unwrap();
        assert_eq!(numbering.number_at(0), i64::MIN);
        assert_eq!(numbering.number_at(1), i64::MIN + 1);

        let mut none: Vec<&str> = Vec::new();
        assert!(Numbering::arrange(&mut none, i64::MAX, SortOrder::Descending).is_ok());
    }

    #[test]
    fn names_are_zero_padded_to_four_digits() {
        assert_eq!(image_name("img", 7, Path::new("/x/a.JPG")), "img_0007.JPG");
        assert_eq!(image_name("img", 12345, Path::new("a.png")), "img_12345.png");
        assert_eq!(image_name("img", 1, Path::new("noext")), "img_0001");
        assert_eq!(caption_name("xxx_", 42), "xxx__0042.txt");
    }
}
