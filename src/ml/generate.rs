// ============================================================
// Layer 5 — Greedy Generation
// ============================================================
// Decodes one batch token by token, always taking the argmax.
//
//   step 0:  [start]
//   step 1:  [start, t1]
//   ...      until every row emitted EOS or max_length is reached
//
// The encoder runs once; the decoder re-runs over the growing
// prefix each step. Rows that already finished keep receiving
// the pad id so the output stays rectangular.

use anyhow::{anyhow, bail, Result};
use burn::prelude::*;

use crate::ml::model::{Seq2SeqConfig, Seq2SeqModel};

/// Generated ids per row, starting with the decoder start token,
/// padded with the pad id to a common length.
pub fn greedy_generate<B: Backend>(
    model:          &Seq2SeqModel<B>,
    config:         &Seq2SeqConfig,
    input_ids:      Tensor<B, 2, Int>,
    attention_mask: Tensor<B, 2, Int>,
    max_length:     usize,
) -> Result<Vec<Vec<i64>>> {
    if max_length > config.max_position_embeddings {
        bail!(
            "generation max length ({max_length}) exceeds max_position_embeddings ({})",
            config.max_position_embeddings
        );
    }
    let [batch_size, _] = input_ids.dims();
    let device = input_ids.device();
    let pad    = config.pad_token_id as i64;
    let eos    = config.eos_token_id as i64;

    let memory = model.encode(input_ids, attention_mask.clone());

    let mut sequences: Vec<Vec<i64>> = vec![vec![config.decoder_start() as i64]; batch_size];
    let mut finished = vec![false; batch_size];

    while sequences[0].len() < max_length.max(1) {
        let len  = sequences[0].len();
        let flat = sequences.iter().flatten().copied().collect::<Vec<_>>();
        let prefix = Tensor::<B, 2, Int>::from_data(TensorData::new(flat, [batch_size, len]), &device);

        let logits = model.decode(prefix, memory.clone(), attention_mask.clone());
        let [_, _, vocab] = logits.dims();
        let next = logits
            .slice([0..batch_size, len - 1..len, 0..vocab])
            .argmax(2)
            .reshape([batch_size]);
        let next = to_i64_vec(next)?;

        for (row, token) in next.into_iter().enumerate() {
            if finished[row] {
                sequences[row].push(pad);
            } else {
                sequences[row].push(token);
                finished[row] = token == eos;
            }
        }

        if finished.iter().all(|&f| f) {
            break;
        }
    }

    Ok(sequences)
}

pub(crate) fn to_i64_vec<B: Backend>(t: Tensor<B, 1, Int>) -> Result<Vec<i64>> {
    t.into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| anyhow!("Cannot read tensor data: {e:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::tests::tiny_config;

    type B = burn::backend::NdArray;

    #[test]
    fn test_generation_respects_max_length_and_start_token() {
        let device = Default::default();
        let cfg    = tiny_config();
        let model  = cfg.init::<B>(&device);

        let ids  = Tensor::<B, 2, Int>::from_data(TensorData::new(vec![4i64, 5, 6, 7, 0, 0], [2, 3]), &device);
        let mask = Tensor::<B, 2, Int>::from_data(TensorData::new(vec![1i64, 1, 1, 1, 0, 0], [2, 3]), &device);

        let out = greedy_generate(&model, &cfg, ids, mask, 5).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|row| row.len() == out[0].len() && row.len() <= 5));
        assert!(out.iter().all(|row| row[0] == cfg.decoder_start() as i64));
    }

    #[test]
    fn test_rows_after_eos_are_padded() {
        let device = Default::default();
        let cfg    = tiny_config();
        let model  = cfg.init::<B>(&device);

        let ids  = Tensor::<B, 2, Int>::from_data(TensorData::new(vec![4i64, 5], [2, 1]), &device);
        let mask = Tensor::<B, 2, Int>::from_data(TensorData::new(vec![1i64, 1], [2, 1]), &device);

        let out = greedy_generate(&model, &cfg, ids, mask, 6).unwrap();
        for row in &out {
            if let Some(pos) = row.iter().skip(1).position(|&t| t == cfg.eos_token_id as i64) {
                assert!(row[pos + 2..].iter().all(|&t| t == cfg.pad_token_id as i64));
            }
        }
    }

    #[test]
    fn test_length_beyond_position_table_is_an_error() {
        let device = Default::default();
        let cfg    = tiny_config();
        let model  = cfg.init::<B>(&device);

        let ids  = Tensor::<B, 2, Int>::from_data(TensorData::new(vec![4i64, 5], [1, 2]), &device);
        let mask = Tensor::<B, 2, Int>::from_data(TensorData::new(vec![1i64, 1], [1, 2]), &device);

        let err = greedy_generate(&model, &cfg, ids, mask, 40).unwrap_err();
        assert!(err.to_string().contains("max_position_embeddings"));
    }
}
