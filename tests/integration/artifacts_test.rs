#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::UInt8Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use mace_seq::utils::io::write_parquet;
    use mace_seq::{
        ArtifactPaths, ArtifactSet, OutputConfig, PatientSequences, PipelineConfig, PipelineError,
        SequenceAssembler,
    };

    use crate::utils::Cohort;

    fn build(cohort: &Cohort, output: &OutputConfig) -> (PatientSequences, ArtifactPaths) {
        SequenceAssembler::new(&PipelineConfig::new().with_max_len(40))
            .assemble_and_persist(
                &cohort.events_batch(),
                &cohort.index_batch(),
                &cohort.outcomes_batch(),
                "index_date",
                output,
            )
            .unwrap()
    }

    #[test]
    fn test_reload_matches_written_set() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig::new(dir.path());
        let (written, paths) = build(&Cohort::generate(1, 120), &output);

        for file in paths.sequence_files() {
            assert!(file.exists(), "{} missing", file.display());
        }
        assert!(!paths.mortality.exists());

        let loaded = ArtifactSet::load(&output).unwrap();
        assert_eq!(loaded.paths, paths);
        assert!(loaded.mortality.is_none());

        let read = &loaded.sequences;
        assert_eq!(read.max_len, written.max_len);
        assert_eq!(read.token_matrix, written.token_matrix);
        assert_eq!(read.valid_lengths, written.valid_lengths);
        assert_eq!(read.outcomes, written.outcomes);
        assert_eq!(read.person_index, written.person_index);
        assert_eq!(read.vocabulary, written.vocabulary);
        assert_eq!(read.summary.patients, written.summary.patients);
        assert_eq!(read.summary.max_raw_len, written.summary.max_raw_len);
    }

    #[test]
    fn test_no_staging_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig::new(dir.path()).with_suffix("_a");
        build(&Cohort::generate(2, 30), &output);

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 6);
        assert!(names.iter().all(|n| n.contains("_a.")));
    }

    #[test]
    fn test_suffixes_keep_runs_apart() {
        let dir = tempfile::tempdir().unwrap();
        let first = OutputConfig::new(dir.path()).with_suffix("_first");
        let second = OutputConfig::new(dir.path()).with_suffix("_second");
        let (a, _) = build(&Cohort::generate(3, 40), &first);
        let (b, _) = build(&Cohort::generate(4, 80), &second);

        assert_eq!(ArtifactSet::load(&first).unwrap().sequences.outcomes, a.outcomes);
        assert_eq!(ArtifactSet::load(&second).unwrap().sequences.outcomes, b.outcomes);
    }

    #[test]
    fn test_row_count_mismatch_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig::new(dir.path());
        let (written, paths) = build(&Cohort::generate(5, 50), &output);

        let schema = Schema::new(vec![Field::new("outcome", DataType::UInt8, false)]);
        let short = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(UInt8Array::from(vec![0; written.len() - 1]))],
        )
        .unwrap();
        write_parquet(&paths.outcomes, &short).unwrap();

        let err = ArtifactSet::load(&output).unwrap_err();
        assert!(matches!(err, PipelineError::Artifact(_)), "{err}");
    }

    #[test]
    fn test_broken_person_index_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig::new(dir.path());
        let (_, paths) = build(&Cohort::generate(6, 20), &output);

        std::fs::write(&paths.person_index, "person_id,row_index\n1,0\n2,0\n").unwrap();
        let err = ArtifactSet::load(&output).unwrap_err();
        assert!(matches!(err, PipelineError::Artifact(_)), "{err}");
    }
}
