//! Conversion between unified transcription requests and Azure batch jobs

use super::types::{
    AzureTranscript, AzureTranscriptionProperties, AzureTranscriptionRequest, TICKS_PER_SECOND,
};
use crate::protocol::{MediaSource, Transcript, TranscriptSegment, TranscriptionRequest, UnifiedResult};
use crate::providers::assemble::Assembled;
use crate::providers::transform::{check_text, CodeTable, TranslateError};

pub const DEFAULT_LOCALE: &str = "en-US";

pub static PROFANITY_MODES: CodeTable<bool, &str> = CodeTable::new(
    "transcribe.profanity_filter",
    &[(true, "Masked"), (false, "None")],
);

/// Convert a unified transcription request to a batch transcription
pub fn to_azure_request(
    request: &TranscriptionRequest,
) -> Result<AzureTranscriptionRequest, TranslateError> {
    let MediaSource::Url { url } = &request.audio else {
        return Err(TranslateError::UnsupportedFeature {
            provider: "azure",
            feature: "transcribe.audio.bytes".to_string(),
        });
    };
    check_text("transcribe.audio.url", url, None)?;

    // batch transcription needs a full locale, a bare language is rejected
    let locale = request.language.as_deref().unwrap_or(DEFAULT_LOCALE);
    let well_formed = locale
        .split_once('-')
        .map(|(lang, region)| {
            !lang.is_empty()
                && !region.is_empty()
                && locale.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
        .unwrap_or(false);
    if !well_formed {
        return Err(TranslateError::validation(
            "language",
            format!("'{}' is not a locale such as en-US", locale),
        ));
    }

    let profanity = PROFANITY_MODES.to_provider(request.profanity_filter.unwrap_or(false))?;

    Ok(AzureTranscriptionRequest {
        content_urls: vec![url.clone()],
        locale: locale.to_string(),
        display_name: format!("longhaul {}", locale),
        properties: AzureTranscriptionProperties {
            diarization_enabled: request.diarization.unwrap_or(false),
            word_level_timestamps_enabled: false,
            profanity_filter_mode: profanity.to_string(),
        },
    })
}

fn seconds(ticks: u64) -> f32 {
    (ticks as f64 / TICKS_PER_SECOND) as f32
}

/// Convert a transcript file to a unified transcript
pub fn from_azure_transcript(transcript: &AzureTranscript) -> Assembled {
    let mut combined: Vec<_> = transcript.combined_recognized_phrases.iter().collect();
    combined.sort_by_key(|phrase| phrase.channel);
    let text = combined
        .iter()
        .map(|phrase| phrase.display.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let mut phrases: Vec<_> = transcript.recognized_phrases.iter().collect();
    phrases.sort_by_key(|phrase| phrase.offset_in_ticks);

    let segments = phrases
        .iter()
        .filter_map(|phrase| {
            let best = phrase.n_best.first()?;
            Some(TranscriptSegment {
                text: best.display.clone(),
                start_seconds: seconds(phrase.offset_in_ticks),
                end_seconds: seconds(phrase.offset_in_ticks + phrase.duration_in_ticks),
                speaker: phrase.speaker.map(|n| format!("speaker_{}", n)),
                confidence: best.confidence,
            })
        })
        .collect();

    let result = Transcript {
        text,
        segments,
        language: phrases.iter().find_map(|p| p.locale.clone()),
        duration_seconds: transcript.duration_in_ticks.map(seconds),
        request_id: None,
    };

    Assembled::new(UnifiedResult::Transcript(result)).drop_extra("azure", &transcript.extra)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::AudioFormat;
    use serde_json::json;

    #[test]
    fn test_defaults_to_en_us() {
        let request = TranscriptionRequest::from_url("https://blob/a.wav");
        let payload = to_azure_request(&request).unwrap();
        assert_eq!(payload.locale, "en-US");
        assert_eq!(payload.properties.profanity_filter_mode, "None");
        assert_eq!(payload.content_urls, vec!["https://blob/a.wav".to_string()]);
    }

    #[test]
    fn test_bare_language_rejected() {
        let request = TranscriptionRequest::from_url("https://blob/a.wav").with_language("en");
        assert!(matches!(
            to_azure_request(&request),
            Err(TranslateError::Validation { field: "language", .. })
        ));
    }

    #[test]
    fn test_inline_audio_unsupported() {
        let request = TranscriptionRequest::from_bytes(vec![1], AudioFormat::Wav);
        assert!(matches!(
            to_azure_request(&request),
            Err(TranslateError::UnsupportedFeature { provider: "azure", .. })
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let mut request = TranscriptionRequest::from_url("https://blob/a.wav")
            .with_language("de-DE")
            .with_diarization(true);
        request.profanity_filter = Some(true);

        let json = serde_json::to_value(to_azure_request(&request).unwrap()).unwrap();
        assert_eq!(json["contentUrls"][0], "https://blob/a.wav");
        assert_eq!(json["properties"]["diarizationEnabled"], true);
        assert_eq!(json["properties"]["profanityFilterMode"], "Masked");
    }

    #[test]
    fn test_transcript_assembly() {
        let transcript: AzureTranscript = serde_json::from_value(json!({
            "source": "https://blob/a.wav",
            "durationInTicks": 45_000_000u64,
            "combinedRecognizedPhrases": [{"channel": 0, "display": "Hi. Bye."}],
            "recognizedPhrases": [
                {"speaker": 2, "offsetInTicks": 20_000_000u64, "durationInTicks": 5_000_000u64,
                 "locale": "en-US", "nBest": [{"confidence": 0.8, "display": "Bye."}]},
                {"speaker": 1, "offsetInTicks": 0, "durationInTicks": 10_000_000u64,
                 "locale": "en-US", "nBest": [{"confidence": 0.9, "display": "Hi."}]}
            ],
            "customProperty": 1
        }))
        .unwrap();

        let assembled = from_azure_transcript(&transcript);
        let UnifiedResult::Transcript(t) = assembled.result else {
            panic!("expected transcript");
        };

        assert_eq!(t.text, "Hi. Bye.");
        assert_eq!(t.segments[0].text, "Hi.");
        assert_eq!(t.segments[0].end_seconds, 1.0);
        assert_eq!(t.segments[1].speaker.as_deref(), Some("speaker_2"));
        assert_eq!(t.segments[1].start_seconds, 2.0);
        assert_eq!(t.duration_seconds, Some(4.5));
        assert_eq!(t.language.as_deref(), Some("en-US"));
        assert_eq!(assembled.dropped, vec!["azure.customProperty".to_string()]);
    }
}
