#[cfg(test)]
mod tests {
    use mace_seq::{
        ArtifactSet, DayWindow, MortalityAligner, OutputConfig, PipelineConfig, PipelineError,
        SequenceAssembler,
    };

    use crate::utils::{Cohort, dated_batch, deaths_batch, events_batch};

    fn build_persons(ids: &[i64], output: &OutputConfig) {
        let events: Vec<(i64, i64, i32)> = ids.iter().map(|&id| (id, 10, 100)).collect();
        let index: Vec<(i64, Option<i32>)> = ids.iter().map(|&id| (id, Some(100))).collect();
        SequenceAssembler::new(&PipelineConfig::new().with_max_len(16))
            .assemble_and_persist(
                &events_batch(&events),
                &dated_batch("index_date", &index),
                &dated_batch("first_mace_date", &[]),
                "index_date",
                output,
            )
            .unwrap();
    }

    #[test]
    fn test_mortality_follows_persisted_row_order() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig::new(dir.path()).with_suffix("_cohort");
        let config = PipelineConfig::new().with_max_len(64);
        let cohort = Cohort::generate(21, 60);

        let (sequences, _) = SequenceAssembler::new(&config)
            .assemble_and_persist(
                &cohort.events_batch(),
                &cohort.index_batch(),
                &cohort.outcomes_batch(),
                "index_date",
                &output,
            )
            .unwrap();

        // Every patient dies 100 days after exposure except the first row's
        let ids = sequences.person_index.ids().to_vec();
        let mut rows: Vec<(i64, i32, Option<i32>)> =
            ids.iter().map(|&id| (id, 500, Some(600))).collect();
        rows[0].2 = Some(500 + 400);
        rows.reverse();
        rows.push((-1, 0, Some(1)));

        let (labels, path) = MortalityAligner::from_config(&config)
            .align_and_persist(&deaths_batch(&rows), &output)
            .unwrap();
        assert!(path.ends_with("mortality_cohort.parquet"));
        assert_eq!(labels.unmatched_rows, 1);
        assert_eq!(labels.labels[0], 0);
        assert!(labels.labels[1..].iter().all(|&v| v == 1));

        let loaded = ArtifactSet::load(&output).unwrap();
        assert_eq!(loaded.mortality.as_deref(), Some(labels.labels.as_slice()));
    }

    #[test]
    fn test_window_is_configurable() {
        let index = mace_seq::PersonIndex::from_ids(vec![1, 2]).unwrap();
        let deaths = deaths_batch(&[(1, 0, Some(20)), (2, 0, Some(40))]);
        let config = PipelineConfig::new().with_mortality_window(DayWindow::new(0, 30));
        let labels = MortalityAligner::from_config(&config).align(&deaths, &index).unwrap();
        assert_eq!(labels.labels, vec![1, 0]);
    }

    #[test]
    fn test_missing_person_index_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig::new(dir.path());
        let result = MortalityAligner::from_config(&PipelineConfig::default())
            .align_and_persist(&deaths_batch(&[(1, 0, Some(1))]), &output);
        assert!(result.is_err());
    }

    #[test]
    fn test_rebuild_discards_mortality_of_previous_cohort() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig::new(dir.path()).with_suffix("_rebuild");
        let aligner = MortalityAligner::from_config(&PipelineConfig::default());

        build_persons(&[1, 2], &output);
        let (labels, path) = aligner
            .align_and_persist(&deaths_batch(&[(1, 0, Some(5))]), &output)
            .unwrap();
        assert_eq!(labels.labels, vec![1, 0]);
        assert!(path.exists());

        build_persons(&[7, 8], &output);
        assert!(!path.exists());
        let loaded = ArtifactSet::load(&output).unwrap();
        assert_eq!(loaded.sequences.person_index.ids(), &[7, 8]);
        assert!(loaded.mortality.is_none());

        let (labels, _) = aligner
            .align_and_persist(&deaths_batch(&[(8, 0, Some(5))]), &output)
            .unwrap();
        assert_eq!(labels.labels, vec![0, 1]);
        assert_eq!(ArtifactSet::load(&output).unwrap().mortality, Some(vec![0, 1]));
    }

    #[test]
    fn test_rebuild_keeps_mortality_of_other_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let kept = OutputConfig::new(dir.path()).with_suffix("_kept");
        let rebuilt = OutputConfig::new(dir.path()).with_suffix("_rebuilt");
        let aligner = MortalityAligner::from_config(&PipelineConfig::default());

        build_persons(&[1, 2], &kept);
        aligner
            .align_and_persist(&deaths_batch(&[(2, 0, Some(5))]), &kept)
            .unwrap();
        build_persons(&[3], &rebuilt);
        build_persons(&[3, 4], &rebuilt);

        assert_eq!(ArtifactSet::load(&kept).unwrap().mortality, Some(vec![0, 1]));
    }

    #[test]
    fn test_inverted_window_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig::new(dir.path());
        build_persons(&[1], &output);

        let config = PipelineConfig::new().with_mortality_window(DayWindow::new(365, 0));
        let result = MortalityAligner::from_config(&config)
            .align_and_persist(&deaths_batch(&[(1, 0, Some(5))]), &output);
        assert!(matches!(result, Err(PipelineError::Config(_))));
        assert!(!ArtifactSet::load(&output).unwrap().paths.mortality.exists());
    }
}
