#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use mace_seq::algorithm::sequence::{CLS_ID, DAY_ID, PAD_ID, SEP_ID};
    use mace_seq::{PipelineConfig, PipelineError, SequenceAssembler, Tokenizer, read_table};

    use crate::utils::{Cohort, dated_batch, day, events_batch};

    #[test]
    fn test_rows_are_aligned_across_outputs() {
        let cohort = Cohort::generate(99, 400);
        let config = PipelineConfig::new().with_max_len(48);
        let sequences = SequenceAssembler::new(&config)
            .assemble(
                &cohort.events_batch(),
                &cohort.index_batch(),
                &cohort.outcomes_batch(),
                "index_date",
            )
            .unwrap();

        let with_events: BTreeSet<i64> = cohort.events.iter().map(|e| e.0).collect();
        assert_eq!(sequences.len(), with_events.len());
        assert_eq!(
            sequences.person_index.ids(),
            with_events.iter().copied().collect::<Vec<_>>().as_slice()
        );
        assert_eq!(sequences.token_matrix.len(), sequences.len() * 48);

        let tokenizer = Tokenizer::new(&sequences.vocabulary, 48);
        for (person_id, row) in sequences.person_index.iter() {
            let (codes, days) = cohort.history(person_id);
            let expected = tokenizer.encode(&codes, &days);

            assert_eq!(sequences.valid_row(row).unwrap(), expected.tokens.as_slice());
            assert_eq!(sequences.valid_lengths[row] as usize, expected.tokens.len());
            assert_eq!(
                sequences.outcomes[row],
                cohort.expected_outcome(person_id, 7, 365)
            );
            assert_eq!(sequences.tokens_for(person_id), sequences.row(row));
        }
    }

    #[test]
    fn test_summary_reflects_run() {
        let cohort = Cohort::generate(4, 150);
        let config = PipelineConfig::new().with_max_len(32);
        let sequences = SequenceAssembler::new(&config)
            .assemble(
                &cohort.events_batch(),
                &cohort.index_batch(),
                &cohort.outcomes_batch(),
                "index_date",
            )
            .unwrap();

        let summary = &sequences.summary;
        assert_eq!(summary.token_matrix_shape(), (sequences.len(), 32));
        assert_eq!(summary.vocabulary_size, sequences.vocabulary.len());
        assert_eq!(
            summary.outcome_positives,
            sequences.outcomes.iter().filter(|&&v| v == 1).count()
        );
        let truncated = sequences.valid_lengths.iter().filter(|&&len| len == 32).count();
        assert!(summary.truncated_sequences <= truncated);
        assert!(summary.max_raw_len >= 32 || summary.truncated_sequences == 0);
        assert_eq!(summary.unknown_codes, 0);
        assert!(summary.to_string().contains("Token Matrix Shape"));
    }

    #[test]
    fn test_same_input_gives_same_output() {
        let cohort = Cohort::generate(8, 200);
        let config = PipelineConfig::new().with_max_len(64);
        let run = || {
            SequenceAssembler::new(&config)
                .assemble(
                    &cohort.events_batch(),
                    &cohort.index_batch(),
                    &cohort.outcomes_batch(),
                    "index_date",
                )
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_walkthrough_with_duplicate_index_dates() {
        let start = day(2024, 1, 1);
        let events = events_batch(&[
            (2, 500, start + 3),
            (1, 401, start),
            (1, 250, start),
            (2, 401, start + 1),
        ]);
        // Patient 2 has two index dates; the earliest one decides the label
        let index = dated_batch(
            "index_date",
            &[(1, Some(start)), (2, Some(start + 300)), (2, Some(start))],
        );
        let outcomes = dated_batch("first_mace_date", &[(2, Some(start + 10))]);

        let config = PipelineConfig::new().with_max_len(8);
        let sequences = SequenceAssembler::new(&config)
            .assemble(&events, &index, &outcomes, "index_date")
            .unwrap();

        // "250" -> 4, "401" -> 5, "500" -> 6
        assert_eq!(
            sequences.row(0).unwrap(),
            &[CLS_ID, DAY_ID, 5, 4, SEP_ID, PAD_ID, PAD_ID, PAD_ID]
        );
        assert_eq!(
            sequences.row(1).unwrap(),
            &[CLS_ID, DAY_ID, 5, SEP_ID, DAY_ID, 6, SEP_ID, PAD_ID]
        );
        assert_eq!(sequences.valid_lengths, vec![5, 7]);
        assert_eq!(sequences.outcomes, vec![0, 1]);
    }

    #[test]
    fn test_missing_index_column_fails_before_processing() {
        let events = events_batch(&[(1, 10, 0)]);
        let index = dated_batch("index_date", &[(1, Some(0))]);
        let outcomes = dated_batch("first_mace_date", &[]);
        let err = SequenceAssembler::new(&PipelineConfig::default())
            .assemble(&events, &index, &outcomes, "cohort_start")
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ColumnNotFound { ref column, .. } if column == "cohort_start"
        ));
    }

    #[test]
    fn test_csv_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let events = dir.path().join("events.csv");
        let index = dir.path().join("index.csv");
        let outcomes = dir.path().join("outcomes.csv");
        std::fs::write(
            &events,
            "person_id,concept_id,event_date\n5,11,2023-03-02\n5,12,2023-03-01\n",
        )
        .unwrap();
        std::fs::write(&index, "person_id,index_date\n5,01.03.2023\n").unwrap();
        std::fs::write(&outcomes, "person_id,first_mace_date\n5,2023-06-01\n").unwrap();

        let sequences = SequenceAssembler::new(&PipelineConfig::default())
            .assemble(
                &read_table(&events).unwrap(),
                &read_table(&index).unwrap(),
                &read_table(&outcomes).unwrap(),
                "index_date",
            )
            .unwrap();
        assert_eq!(
            sequences.valid_row(0).unwrap(),
            &[CLS_ID, DAY_ID, 5, SEP_ID, DAY_ID, 4, SEP_ID]
        );
        assert_eq!(sequences.outcomes, vec![1]);
    }

    #[test]
    fn test_non_integer_person_ids_fail_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let events = dir.path().join("events.csv");
        std::fs::write(
            &events,
            "person_id,concept_id,event_date\nP1,10,2024-01-01\nP1,20,2024-01-02\n",
        )
        .unwrap();
        let index = dated_batch("index_date", &[(1, Some(0))]);
        let outcomes = dated_batch("first_mace_date", &[]);

        let err = SequenceAssembler::new(&PipelineConfig::default())
            .assemble(&read_table(&events).unwrap(), &index, &outcomes, "index_date")
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidIdentifier { ref column, count: 2, .. } if column == "person_id"
        ));
    }
}
