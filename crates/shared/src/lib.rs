pub mod domain;
pub mod error;
pub mod protocol;

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{
        domain::{JobType, ResultItem, ResultItemKind, SortMode, WatchState},
        error::AddWatchError,
        protocol::ServerEvent,
    };

    fn item_json(extra: &str) -> String {
        format!(
            r#"{{"path":"/notes/report.md","tags":["work"],"createdAt":"2024-01-01T00:00:00Z","modifiedAt":"2024-01-02T00:00:00Z"{extra}}}"#
        )
    }

    #[test]
    fn highlight_presence_classifies_items() {
        let plain: ResultItem = serde_json::from_str(&item_json("")).expect("plain");
        assert_eq!(plain.kind(), ResultItemKind::Plain);

        let null_highlight: ResultItem =
            serde_json::from_str(&item_json(r#","highlight":null"#)).expect("null highlight");
        assert_eq!(null_highlight.kind(), ResultItemKind::SearchResult);

        let highlighted: ResultItem =
            serde_json::from_str(&item_json(r#","highlight":"<b>report</b>""#))
                .expect("highlighted");
        assert_eq!(highlighted.highlight.as_deref(), Some("<b>report</b>"));
    }

    #[test]
    fn display_title_falls_back_to_file_stem() {
        let mut item: ResultItem = serde_json::from_str(&item_json("")).expect("item");
        assert_eq!(item.display_title(), "report");

        item.title = Some("Quarterly report".into());
        assert_eq!(item.display_title(), "Quarterly report");

        item.title = None;
        item.path = PathBuf::from("/");
        assert_eq!(item.display_title(), "Untitled");
    }

    #[test]
    fn add_watch_error_uses_kebab_case_type_tag() {
        let raw = serde_json::to_string(&AddWatchError::ParentChildRelationship).expect("encode");
        assert_eq!(raw, r#"{"type":"parent-child-relationship"}"#);

        let parsed: AddWatchError =
            serde_json::from_str(r#"{"type":"watch-already-exists"}"#).expect("decode");
        assert_eq!(parsed, AddWatchError::WatchAlreadyExists);
        assert!(parsed.is_validation());
        assert!(!AddWatchError::Other.is_validation());
    }

    #[test]
    fn watches_event_decodes_job_reports() {
        let raw = r#"{"type":"watches","payload":{"watches":[{"id":1,"path":"/a","status":"adding","createdAt":"2024-01-01T00:00:00Z","documentCount":3}],"jobReports":[{"watch":{"id":1,"path":"/a","status":"adding","createdAt":"2024-01-01T00:00:00Z"},"progress":{"done":1,"total":4},"jobType":"scan_watch_path","status":"running"}]}}"#;
        let ServerEvent::Watches(state) = serde_json::from_str(raw).expect("decode") else {
            panic!("expected watches event");
        };
        let watch = &state.watches[0];
        let report = state.job_report_for(watch.id).expect("report");
        assert_eq!(report.job_type, JobType::Scan);
        assert!(!state.has_finished_job());
        assert!(watch.overlaps(Path::new("/a/b")));
        assert!(!watch.overlaps(Path::new("/ab")));
        assert_eq!(WatchState::default().watches.len(), 0);
    }

    #[test]
    fn sort_mode_round_trips_through_str() {
        for sort in SortMode::ALL {
            assert_eq!(sort.as_str().parse::<SortMode>(), Ok(sort));
        }
        assert!("newest".parse::<SortMode>().is_err());
    }
}
