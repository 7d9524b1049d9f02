// ============================================================
// Layer 5 — Seq2Seq Transformer (encoder-decoder)
// ============================================================
// input_ids ──► embed + positions ──► TransformerEncoder ──► memory
//                                                              │
// decoder_input_ids ──► embed + positions ──► TransformerDecoder
//                                   (causal mask)              │
//                                                      LM head ▼
//                                          logits [batch, target, vocab]
//
// The loss averages token cross-entropy over the label positions
// that are not IGNORE_INDEX, so extra padding in a batch does not
// change it. A label equal to the pad id still counts.

use burn::{
    nn::{
        attention::generate_autoregressive_mask,
        transformer::{
            TransformerDecoder, TransformerDecoderConfig, TransformerDecoderInput,
            TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput,
        },
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::log_softmax,
};
use serde::{Deserialize, Serialize};

use crate::data::batcher::Seq2SeqBatch;
use crate::domain::example::IGNORE_INDEX;

/// Architecture and special tokens, read from a checkpoint's `config.json`.
///
/// Aliases accept the key names common hub configs use, so a config
/// written for another encoder/decoder model reads without edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seq2SeqConfig {
    pub vocab_size: usize,
    pub d_model:    usize,

    #[serde(alias = "encoder_ffn_dim")]
    pub d_ff: usize,

    #[serde(alias = "encoder_attention_heads")]
    pub num_heads: usize,

    #[serde(alias = "num_layers", alias = "encoder_layers")]
    pub num_encoder_layers: usize,

    #[serde(alias = "decoder_layers")]
    pub num_decoder_layers: usize,

    #[serde(alias = "dropout_rate", default = "default_dropout")]
    pub dropout: f64,

    #[serde(alias = "n_positions", default = "default_max_positions")]
    pub max_position_embeddings: usize,

    #[serde(default)]
    pub pad_token_id: u32,

    #[serde(default = "default_eos")]
    pub eos_token_id: u32,

    /// Falls back to `pad_token_id` when absent.
    #[serde(default)]
    pub decoder_start_token_id: Option<u32>,

    /// Default generation length.
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

fn default_dropout() -> f64 { 0.1 }
fn default_max_positions() -> usize { 512 }
fn default_eos() -> u32 { 1 }
fn default_max_length() -> usize { 128 }

impl Seq2SeqConfig {
    pub fn decoder_start(&self) -> u32 {
        self.decoder_start_token_id.unwrap_or(self.pad_token_id)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.num_heads == 0 || self.d_model % self.num_heads != 0 {
            anyhow::bail!(
                "d_model ({}) must be divisible by num_heads ({})",
                self.d_model,
                self.num_heads
            );
        }
        for (name, id) in [
            ("pad_token_id", self.pad_token_id),
            ("eos_token_id", self.eos_token_id),
            ("decoder_start_token_id", self.decoder_start()),
        ] {
            if id as usize >= self.vocab_size {
                anyhow::bail!("{name} {id} is outside the vocabulary ({})", self.vocab_size);
            }
        }
        if self.max_length > self.max_position_embeddings {
            anyhow::bail!(
                "max_length ({}) exceeds max_position_embeddings ({})",
                self.max_length,
                self.max_position_embeddings
            );
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Seq2SeqModel<B> {
        let encoder = TransformerEncoderConfig::new(
            self.d_model, self.d_ff, self.num_heads, self.num_encoder_layers,
        )
        .with_dropout(self.dropout)
        .with_norm_first(true)
        .init(device);
        let decoder = TransformerDecoderConfig::new(
            self.d_model, self.d_ff, self.num_heads, self.num_decoder_layers,
        )
        .with_dropout(self.dropout)
        .with_norm_first(true)
        .init(device);

        Seq2SeqModel {
            token_embedding:    EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            encoder_positions:  EmbeddingConfig::new(self.max_position_embeddings, self.d_model).init(device),
            decoder_positions:  EmbeddingConfig::new(self.max_position_embeddings, self.d_model).init(device),
            encoder,
            decoder,
            lm_head:            LinearConfig::new(self.d_model, self.vocab_size).init(device),
            dropout:            DropoutConfig::new(self.dropout).init(),
            pad_token_id:       self.pad_token_id as usize,
        }
    }
}

#[derive(Module, Debug)]
pub struct Seq2SeqModel<B: Backend> {
    pub token_embedding:   Embedding<B>,
    pub encoder_positions: Embedding<B>,
    pub decoder_positions: Embedding<B>,
    pub encoder:           TransformerEncoder<B>,
    pub decoder:           TransformerDecoder<B>,
    pub lm_head:           Linear<B>,
    pub dropout:           Dropout,
    pub pad_token_id:      usize,
}

impl<B: Backend> Seq2SeqModel<B> {
    /// Token + learned position embeddings: [batch, seq] → [batch, seq, d_model]
    fn embed(&self, ids: Tensor<B, 2, Int>, positions: &Embedding<B>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = ids.dims();
        let device  = ids.device();
        let tok_emb = self.token_embedding.forward(ids);
        let pos_ids = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        self.dropout.forward(tok_emb + positions.forward(pos_ids))
    }

    /// Encoder memory: [batch, source_len, d_model]
    pub fn encode(&self, input_ids: Tensor<B, 2, Int>, attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let x = self.embed(input_ids, &self.encoder_positions);
        self.encoder
            .forward(TransformerEncoderInput::new(x).mask_pad(attention_mask.equal_elem(0)))
    }

    /// Next-token logits for every decoder position: [batch, target_len, vocab]
    pub fn decode(
        &self,
        decoder_input_ids: Tensor<B, 2, Int>,
        memory:            Tensor<B, 3>,
        attention_mask:    Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let [batch_size, target_len] = decoder_input_ids.dims();
        let x = self.embed(decoder_input_ids, &self.decoder_positions);
        // The start token may equal the pad id, so only the causal mask
        // applies on the target side; padded label positions carry no loss.
        let causal = generate_autoregressive_mask::<B>(batch_size, target_len, &x.device());
        let input  = TransformerDecoderInput::new(x, memory)
            .target_mask_attn(causal)
            .memory_mask_pad(attention_mask.equal_elem(0));
        self.lm_head.forward(self.decoder.forward(input))
    }

    pub fn forward(&self, batch: &Seq2SeqBatch<B>) -> Tensor<B, 3> {
        let memory = self.encode(batch.input_ids.clone(), batch.attention_mask.clone());
        self.decode(batch.decoder_input_ids.clone(), memory, batch.attention_mask.clone())
    }

    /// Mean token cross-entropy over non-ignored label positions.
    pub fn forward_loss(&self, batch: &Seq2SeqBatch<B>) -> (Tensor<B, 1>, Tensor<B, 3>) {
        let logits = self.forward(batch);
        let [batch_size, target_len, _] = logits.dims();

        let ignored = batch.labels.clone().equal_elem(IGNORE_INDEX);
        let targets = batch.labels.clone().mask_fill(ignored.clone(), 0);

        let token_nll = log_softmax(logits.clone(), 2)
            .gather(2, targets.unsqueeze_dim::<3>(2))
            .reshape([batch_size, target_len])
            .neg()
            .mask_fill(ignored.clone(), 0.0);

        let counted = ignored.bool_not().int().sum().float().clamp_min(1.0);
        (token_nll.sum() / counted, logits)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::batcher::Seq2SeqBatcher;
    use crate::domain::example::Seq2SeqExample;
    use burn::data::dataloader::batcher::Batcher;

    type B = burn::backend::NdArray;

    pub(crate) fn tiny_config() -> Seq2SeqConfig {
        Seq2SeqConfig {
            vocab_size:              16,
            d_model:                 8,
            d_ff:                    16,
            num_heads:               2,
            num_encoder_layers:      1,
            num_decoder_layers:      1,
            dropout:                 0.0,
            max_position_embeddings: 16,
            pad_token_id:            0,
            eos_token_id:            1,
            decoder_start_token_id:  None,
            max_length:              6,
        }
    }

    #[test]
    fn test_config_reads_hub_style_keys() {
        let json = r#"{
            "vocab_size": 32, "d_model": 8, "encoder_ffn_dim": 16,
            "encoder_attention_heads": 2, "encoder_layers": 1, "decoder_layers": 1,
            "dropout_rate": 0.2, "pad_token_id": 0, "eos_token_id": 2,
            "decoder_start_token_id": 3, "architectures": ["Whatever"]
        }"#;
        let cfg: Seq2SeqConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.d_ff, 16);
        assert_eq!(cfg.num_heads, 2);
        assert_eq!(cfg.dropout, 0.2);
        assert_eq!(cfg.decoder_start(), 3);
        assert_eq!(cfg.max_position_embeddings, 512);
    }

    #[test]
    fn test_validate_rejects_bad_heads() {
        let mut cfg = tiny_config();
        cfg.num_heads = 3;
        assert!(cfg.validate().is_err());
        assert!(tiny_config().validate().is_ok());
    }

    #[test]
    fn test_forward_shapes_and_finite_loss() {
        let device  = Default::default();
        let model   = tiny_config().init::<B>(&device);
        let batcher = Seq2SeqBatcher::<B>::new(device, 0, 0);
        let batch   = batcher.batch(vec![
            Seq2SeqExample::new(vec![4, 5, 6], vec![7, 8, 1]),
            Seq2SeqExample::new(vec![9], vec![10, 1]),
        ]);

        let (loss, logits) = model.forward_loss(&batch);
        assert_eq!(logits.dims(), [2, 3, 16]);
        let loss: f64 = loss.into_scalar().elem();
        assert!(loss.is_finite() && loss > 0.0);
    }

    fn labelled_batch(labels: Vec<i64>) -> Seq2SeqBatch<B> {
        let device = Default::default();
        let target_len = labels.len();
        let mut decoder_input = vec![0i64];
        decoder_input.extend(labels.iter().take(target_len - 1).map(|&l| l.max(0)));
        Seq2SeqBatch {
            input_ids:         Tensor::from_data(TensorData::new(vec![4i64, 5, 6], [1, 3]), &device),
            attention_mask:    Tensor::from_data(TensorData::new(vec![1i64, 1, 1], [1, 3]), &device),
            labels:            Tensor::from_data(TensorData::new(labels.clone(), [1, target_len]), &device),
            decoder_input_ids: Tensor::from_data(TensorData::new(decoder_input, [1, target_len]), &device),
            label_rows:        vec![labels],
        }
    }

    #[test]
    fn test_ignored_label_padding_leaves_loss_unchanged() {
        let device = Default::default();
        let model  = tiny_config().init::<B>(&device);

        let (plain, _)  = model.forward_loss(&labelled_batch(vec![7, 1]));
        let (padded, _) = model.forward_loss(&labelled_batch(vec![7, 1, IGNORE_INDEX, IGNORE_INDEX]));
        let plain: f64  = plain.into_scalar().elem();
        let padded: f64 = padded.into_scalar().elem();

        assert!((plain - padded).abs() < 1e-5, "plain={plain} padded={padded}");
    }

    #[test]
    fn test_label_equal_to_pad_id_is_scored() {
        let device = Default::default();
        let model  = tiny_config().init::<B>(&device);

        // Same positions, but the pad-valued label is either scored or ignored.
        let (scored, _)  = model.forward_loss(&labelled_batch(vec![7, 0]));
        let (dropped, _) = model.forward_loss(&labelled_batch(vec![7, IGNORE_INDEX]));
        let (first, _)   = model.forward_loss(&labelled_batch(vec![7]));
        let scored: f64  = scored.into_scalar().elem();
        let dropped: f64 = dropped.into_scalar().elem();
        let first: f64   = first.into_scalar().elem();

        assert!((dropped - first).abs() < 1e-5);
        assert!((scored - dropped).abs() > 1e-7);
    }
}
