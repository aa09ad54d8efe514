use regex::Regex;
use serde::{Deserialize, Serialize};

/// A chapter inside a longer video, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub offset: u64,
    pub length: u64,
}

/// Parses `0:00 Intro` style timestamps out of a video description.
///
/// Lines before the first timestamp at `0:00`/`0:01` are ignored. Fewer
/// than two chapters, or a first chapter more than 10 s in, yield nothing.
pub fn parse_from_description(description: &str, video_duration: u64) -> Vec<Chapter> {
    let Ok(pattern) = Regex::new(r"(\d+:)?(\d+):(\d+)") else {
        return Vec::new();
    };

    let mut stamps: Vec<(u64, String)> = Vec::new();
    let mut found_first = false;

    for line in description.lines() {
        let Some(found) = pattern.find(line) else {
            continue;
        };
        let Some(timestamp) = parse_clock(found.as_str()) else {
            continue;
        };

        if !found_first {
            if timestamp > 1 {
                continue;
            }
            found_first = true;
        }

        let title = line[found.end()..]
            .trim()
            .trim_start_matches(['-', '–', '|', ':'])
            .trim();
        let title = if title.is_empty() {
            format!("Chapter {}", stamps.len() + 1)
        } else {
            title.to_string()
        };

        stamps.push((timestamp, title));
    }

    stamps.sort_by_key(|(timestamp, _)| *timestamp);
    from_starts(stamps, video_duration)
}

/// Builds chapters from `(start, title)` pairs, the last one running to the
/// end of the video.
pub fn from_starts(mut stamps: Vec<(u64, String)>, video_duration: u64) -> Vec<Chapter> {
    stamps.sort_by_key(|(timestamp, _)| *timestamp);

    if stamps.len() < 2 || stamps[0].0 > 10 {
        return Vec::new();
    }

    let ends: Vec<u64> = stamps
        .iter()
        .skip(1)
        .map(|(start, _)| *start)
        .chain(std::iter::once(video_duration))
        .collect();

    stamps
        .into_iter()
        .zip(ends)
        .map(|((offset, title), end)| Chapter {
            title,
            offset,
            length: end.saturating_sub(offset),
        })
        .collect()
}

fn parse_clock(raw: &str) -> Option<u64> {
    let parts: Vec<u64> = raw
        .split(':')
        .map(|p| p.parse().ok())
        .collect::<Option<Vec<u64>>>()?;

    match parts.as_slice() {
        [m, s] => Some(m * 60 + s),
        [h, m, s] => Some(h * 3600 + m * 60 + s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_description_chapters() {
        let description = "Tracklist below\n\
                           Out now on vinyl 12:00\n\
                           0:00 Intro\n\
                           3:15 - Second Song\n\
                           1:02:03 Finale\n";

        let chapters = parse_from_description(description, 4000);
        assert_eq!(
            chapters,
            vec![
                Chapter { title: "Intro".into(), offset: 0, length: 195 },
                Chapter { title: "Second Song".into(), offset: 195, length: 3528 },
                Chapter { title: "Finale".into(), offset: 3723, length: 277 },
            ]
        );
    }

    #[test]
    fn needs_two_chapters_starting_at_zero() {
        assert!(parse_from_description("0:00 only one", 300).is_empty());
        assert!(parse_from_description("1:00 late\n2:00 later", 300).is_empty());
        assert!(parse_from_description("", 300).is_empty());
    }

    #[test]
    fn untitled_chapters_get_numbered() {
        let chapters = parse_from_description("0:00\n1:00", 120);
        assert_eq!(chapters[0].title, "Chapter 1");
        assert_eq!(chapters[1].title, "Chapter 2");
    }

    #[test]
    fn explicit_starts_are_sorted() {
        let chapters = from_starts(vec![(60, "b".into()), (0, "a".into())], 90);
        assert_eq!(chapters[0].title, "a");
        assert_eq!(chapters[1].length, 30);
    }
}
