use encore_core::{PlaybackStatus, PlayerStatus, TrackInfo, MAX_VOLUME};

/// Parses the output of `cmus-remote -Q`.
///
/// Lines that do not match a known prefix, or whose value does not parse,
/// are skipped. A track is attached only when a non-empty `file` line is
/// present; tags seen without one are discarded.
pub fn parse_status(output: &str) -> PlayerStatus {
    let mut status = PlayerStatus::default();
    let mut file: Option<String> = None;
    let mut track = TrackInfo::new(String::new());

    for line in output.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("status ") {
            if let Some(parsed) = rest.split_whitespace().next().and_then(PlaybackStatus::from_word) {
                status.status = parsed;
            }
        } else if let Some(rest) = line.strip_prefix("file ") {
            file = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("tag ") {
            apply_tag(&mut track, rest);
        } else if let Some(rest) = line.strip_prefix("duration ") {
            if let Some(seconds) = parse_seconds(rest) {
                track.duration = Some(seconds);
            }
        } else if let Some(rest) = line.strip_prefix("position ") {
            if let Some(seconds) = parse_seconds(rest) {
                track.position = Some(seconds);
            }
        } else if let Some(rest) = line.strip_prefix("set ") {
            apply_setting(&mut status, rest);
        }
    }

    status.track = file
        .filter(|path| !path.is_empty())
        .map(|file| TrackInfo { file, ..track });
    status
}

fn apply_tag(track: &mut TrackInfo, rest: &str) {
    let rest = rest.trim_start();
    let Some((name, value)) = rest.split_once(char::is_whitespace) else {
        return;
    };
    let value = value.trim_start();
    if value.is_empty() {
        return;
    }
    let slot = match name.to_lowercase().as_str() {
        "artist" => &mut track.artist,
        "album" => &mut track.album,
        "title" => &mut track.title,
        "genre" => &mut track.genre,
        "date" => &mut track.date,
        _ => return,
    };
    *slot = Some(value.to_string());
}

fn apply_setting(status: &mut PlayerStatus, rest: &str) {
    let mut parts = rest.split_whitespace();
    let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
        return;
    };
    match key {
        "vol_left" => {
            if let Ok(volume) = value.parse::<u32>() {
                status.volume = volume.min(u32::from(MAX_VOLUME)) as u8;
            }
        }
        "repeat" => status.repeat = value == "true",
        "shuffle" => status.shuffle = value == "true",
        _ => {}
    }
}

fn parse_seconds(rest: &str) -> Option<u32> {
    rest.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_status_block() {
        let output = "status playing\nfile /m/song.mp3\ntag artist Beatles\ntag title Come Together\nduration 259\nposition 30\nset vol_left 75\nset shuffle true\n";
        let status = parse_status(output);

        assert_eq!(status.status, PlaybackStatus::Playing);
        assert_eq!(status.volume, 75);
        assert!(status.shuffle);
        assert!(!status.repeat);
        let track = status.track.expect("track attached");
        assert_eq!(track.file, "/m/song.mp3");
        assert_eq!(track.artist.as_deref(), Some("Beatles"));
        assert_eq!(track.title.as_deref(), Some("Come Together"));
        assert_eq!(track.duration, Some(259));
        assert_eq!(track.position, Some(30));
    }

    #[test]
    fn tags_without_file_yield_no_track() {
        let status = parse_status("status paused\ntag artist Nobody\nduration 10\n");
        assert_eq!(status.status, PlaybackStatus::Paused);
        assert!(status.track.is_none());
    }

    #[test]
    fn right_channel_volume_is_ignored() {
        let status = parse_status("set vol_left 42\nset vol_right 77\n");
        assert_eq!(status.volume, 42);
    }

    #[test]
    fn defaults_when_output_is_empty() {
        let status = parse_status("");
        assert_eq!(status, PlayerStatus::default());
        assert_eq!(status.volume, 100);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let output = "status bogus\nfile /a.flac\nduration soon\nposition -4\nset vol_left loud\ntag\ntag comment\n";
        let status = parse_status(output);
        assert_eq!(status.status, PlaybackStatus::Stopped);
        assert_eq!(status.volume, 100);
        let track = status.track.expect("track attached");
        assert_eq!(track.duration, None);
        assert_eq!(track.position, None);
    }

    #[test]
    fn later_tags_overwrite_and_names_fold_case() {
        let status = parse_status("file /a.ogg\ntag TITLE First\ntag title Second Take\n");
        assert_eq!(
            status.track.and_then(|t| t.title).as_deref(),
            Some("Second Take")
        );
    }

    #[test]
    fn file_path_keeps_inner_spaces() {
        let status = parse_status("file /music/My Band/01 Intro.mp3\n");
        assert_eq!(
            status.current_file(),
            Some("/music/My Band/01 Intro.mp3")
        );
    }

    #[test]
    fn empty_file_line_is_not_a_track() {
        let status = parse_status("file \ntag title Ghost\n");
        assert!(status.track.is_none());
    }

    #[test]
    fn volume_is_clamped_and_flags_need_literal_true() {
        let status = parse_status("set vol_left 180\nset repeat True\nset shuffle false\n");
        assert_eq!(status.volume, 100);
        assert!(!status.repeat);
        assert!(!status.shuffle);
    }
}
