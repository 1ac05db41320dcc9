use course_core::model::completion_percent;

/// Aggregated completion view for a course, always derived from the live
/// completion map rather than stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CourseProgress {
    pub total_sections: usize,
    pub completed_sections: usize,
    pub percent: u8,
}

impl CourseProgress {
    #[must_use]
    pub fn derive(completed: usize, total: usize) -> Self {
        Self {
            total_sections: total,
            completed_sections: completed,
            percent: completion_percent(completed, total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_tracks_the_counts() {
        let progress = CourseProgress::derive(2, 3);
        assert_eq!(progress.percent, 67);
        assert_eq!(CourseProgress::derive(0, 0).percent, 0);
        assert_eq!(CourseProgress::derive(3, 3).percent, 100);
    }
}
