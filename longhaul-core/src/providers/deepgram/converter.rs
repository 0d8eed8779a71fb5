//! Conversion between unified transcription requests and Deepgram calls

use super::types::{DeepgramAudio, DeepgramRequest, DeepgramResponse, DeepgramWord};
use crate::protocol::{MediaSource, Transcript, TranscriptSegment, TranscriptionRequest, UnifiedResult};
use crate::providers::assemble::Assembled;
use crate::providers::transform::{check_text, TranslateError, AUDIO_MIME_TYPES};

pub const DEFAULT_MODEL: &str = "nova-3";

/// Deepgram caps boosted terms per request
pub const MAX_VOCABULARY: usize = 100;

/// Convert a unified transcription request to a `/v1/listen` call
pub fn to_deepgram_request(request: &TranscriptionRequest) -> Result<DeepgramRequest, TranslateError> {
    let audio = match &request.audio {
        MediaSource::Url { url } => {
            check_text("transcribe.audio.url", url, None)?;
            DeepgramAudio::Url(url.clone())
        }
        MediaSource::Bytes { data, mime_type } => {
            if data.is_empty() {
                return Err(TranslateError::validation("transcribe.audio.bytes", "audio is empty"));
            }
            let mime_type = match request.format {
                Some(format) => AUDIO_MIME_TYPES.to_provider(format)?.to_string(),
                None if mime_type.starts_with("audio/") => mime_type.clone(),
                None => {
                    return Err(TranslateError::validation(
                        "transcribe.format",
                        "inline audio needs a format",
                    ))
                }
            };
            DeepgramAudio::Bytes {
                data: data.clone(),
                mime_type,
            }
        }
    };

    if let Some(language) = &request.language {
        check_language(language)?;
    }

    if request.vocabulary.len() > MAX_VOCABULARY {
        return Err(TranslateError::validation(
            "transcribe.vocabulary",
            format!("{} terms exceeds the limit of {}", request.vocabulary.len(), MAX_VOCABULARY),
        ));
    }
    for term in &request.vocabulary {
        check_text("transcribe.vocabulary", term, None)?;
    }

    Ok(DeepgramRequest {
        audio,
        model: request.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        language: request.language.clone(),
        diarize: request.diarization.unwrap_or(false),
        profanity_filter: request.profanity_filter.unwrap_or(false),
        smart_format: true,
        vocabulary: request.vocabulary.clone(),
    })
}

fn check_language(language: &str) -> Result<(), TranslateError> {
    let valid = !language.is_empty()
        && language
            .split('-')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric()));
    if valid {
        Ok(())
    } else {
        Err(TranslateError::validation(
            "language",
            format!("'{}' is not a language tag", language),
        ))
    }
}

/// Convert a Deepgram response to a unified transcript
pub fn from_deepgram_response(response: &DeepgramResponse) -> Assembled {
    let channel = response.results.channels.first();
    let best = channel.and_then(|c| c.alternatives.first());

    let transcript = Transcript {
        text: best.map(|a| a.transcript.clone()).unwrap_or_default(),
        segments: best.map(|a| speaker_turns(&a.words)).unwrap_or_default(),
        language: channel.and_then(|c| c.detected_language.clone()),
        duration_seconds: response.metadata.duration,
        request_id: response.metadata.request_id.clone(),
    };

    let mut assembled =
        Assembled::new(UnifiedResult::Transcript(transcript)).drop_extra("deepgram", &response.extra);
    if response.results.channels.len() > 1 {
        assembled.dropped.push("deepgram.results.channels".to_string());
    }
    assembled
}

/// Group consecutive words of the same speaker into segments
fn speaker_turns(words: &[DeepgramWord]) -> Vec<TranscriptSegment> {
    let mut segments = Vec::new();
    let mut turn: Vec<&DeepgramWord> = Vec::new();

    for word in words {
        if let Some(last) = turn.last() {
            if last.speaker != word.speaker {
                segments.push(segment_of(&turn));
                turn.clear();
            }
        }
        turn.push(word);
    }
    if !turn.is_empty() {
        segments.push(segment_of(&turn));
    }
    segments
}

fn segment_of(words: &[&DeepgramWord]) -> TranscriptSegment {
    let text = words
        .iter()
        .map(|w| w.punctuated_word.as_deref().unwrap_or(&w.word))
        .collect::<Vec<_>>()
        .join(" ");

    let scored: Vec<f32> = words.iter().filter_map(|w| w.confidence).collect();
    let confidence = if scored.is_empty() {
        None
    } else {
        Some(scored.iter().sum::<f32>() / scored.len() as f32)
    };

    TranscriptSegment {
        text,
        start_seconds: words.first().map(|w| w.start).unwrap_or_default(),
        end_seconds: words.last().map(|w| w.end).unwrap_or_default(),
        speaker: words.first().and_then(|w| w.speaker).map(|n| format!("speaker_{}", n)),
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::AudioFormat;
    use serde_json::json;

    fn response(words: serde_json::Value) -> DeepgramResponse {
        serde_json::from_value(json!({
            "metadata": {"request_id": "req-1", "duration": 3.5, "sha256": "abc"},
            "results": {"channels": [{
                "detected_language": "en",
                "alternatives": [{"transcript": "hello there general", "confidence": 0.9, "words": words}]
            }]}
        }))
        .unwrap()
    }

    #[test]
    fn test_query_uses_keyterm_on_nova3() {
        let request = TranscriptionRequest::from_url("https://audio/a.wav")
            .with_vocabulary(vec!["longhaul".to_string()]);
        let payload = to_deepgram_request(&request).unwrap();
        let pairs = payload.query_pairs();

        assert!(pairs.contains(&("keyterm", "longhaul".to_string())));
        assert!(pairs.contains(&("detect_language", "true".to_string())));
    }

    #[test]
    fn test_query_uses_keywords_on_older_models() {
        let mut request = TranscriptionRequest::from_url("https://audio/a.wav")
            .with_vocabulary(vec!["longhaul".to_string()])
            .with_language("en-US");
        request.model = Some("nova-2".to_string());
        let pairs = to_deepgram_request(&request).unwrap().query_pairs();

        assert!(pairs.contains(&("keywords", "longhaul".to_string())));
        assert!(pairs.contains(&("language", "en-US".to_string())));
    }

    #[test]
    fn test_inline_audio_takes_format_mime() {
        let request = TranscriptionRequest::from_bytes(vec![1, 2], AudioFormat::Mp3);
        let payload = to_deepgram_request(&request).unwrap();
        assert_eq!(
            payload.audio,
            DeepgramAudio::Bytes {
                data: vec![1, 2],
                mime_type: "audio/mpeg".to_string()
            }
        );
    }

    #[test]
    fn test_bad_language_tag() {
        let request = TranscriptionRequest::from_url("https://audio/a.wav").with_language("en_US");
        assert!(to_deepgram_request(&request).is_err());
    }

    #[test]
    fn test_speaker_turns() {
        let raw = response(json!([
            {"word": "hello", "start": 0.0, "end": 0.4, "confidence": 0.9, "speaker": 0, "punctuated_word": "Hello"},
            {"word": "there", "start": 0.5, "end": 0.9, "confidence": 0.7, "speaker": 0},
            {"word": "general", "start": 1.2, "end": 1.8, "confidence": 0.8, "speaker": 1}
        ]));
        let assembled = from_deepgram_response(&raw);
        let UnifiedResult::Transcript(t) = assembled.result else {
            panic!("expected transcript");
        };

        assert_eq!(t.segments.len(), 2);
        assert_eq!(t.segments[0].text, "Hello there");
        assert_eq!(t.segments[0].speaker.as_deref(), Some("speaker_0"));
        assert!((t.segments[0].confidence.unwrap() - 0.8).abs() < 1e-6);
        assert_eq!(t.segments[1].start_seconds, 1.2);
        assert_eq!(t.language.as_deref(), Some("en"));
        assert_eq!(t.request_id.as_deref(), Some("req-1"));
        assert!(assembled.dropped.is_empty());
    }

    #[test]
    fn test_empty_results() {
        let raw: DeepgramResponse = serde_json::from_value(json!({
            "metadata": {},
            "results": {"channels": []},
            "warnings": []
        }))
        .unwrap();
        let assembled = from_deepgram_response(&raw);
        assert_eq!(assembled.result, UnifiedResult::Transcript(Transcript::default()));
        assert_eq!(assembled.dropped, vec!["deepgram.warnings".to_string()]);
    }
}
