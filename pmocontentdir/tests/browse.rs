use lofty::config::WriteOptions;
use lofty::prelude::*;
use lofty::tag::{ItemKey, Tag, TagType};
use pmocontentdir::pmodidl::{DIDLLite, DidlObject, MediaMetadataParser};
use pmocontentdir::{BaseUrlResolver, ContentDirectory, ContentDirectoryError, ObjectId, ROOT_ID};
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn directory() -> ContentDirectory {
    ContentDirectory::new(Arc::new(BaseUrlResolver::new(
        "http://127.0.0.1:8080",
        "/ContentDirectory",
    )))
}

fn children(cd: &ContentDirectory, id: ObjectId) -> (DIDLLite, u32, u32, u32) {
    let response = cd
        .browse(&id.to_string(), "BrowseDirectChildren", "*", 0, 0, "")
        .unwrap();
    let didl = DIDLLite::parse(&response.result).unwrap();
    (
        didl,
        response.number_returned,
        response.total_matches,
        response.update_id,
    )
}

fn metadata(cd: &ContentDirectory, id: ObjectId) -> DidlObject {
    let response = cd
        .browse(&id.to_string(), "BrowseMetadata", "*", 0, 0, "")
        .unwrap();
    assert_eq!(response.number_returned, 1);
    assert_eq!(response.total_matches, 1);
    let didl = DIDLLite::parse(&response.result).unwrap();
    didl.objects.into_iter().next().unwrap()
}

fn ids(didl: &DIDLLite) -> Vec<ObjectId> {
    didl.objects.iter().map(|o| o.id().parse().unwrap()).collect()
}

fn titles(didl: &DIDLLite) -> Vec<String> {
    didl.objects.iter().map(|o| o.title().to_string()).collect()
}

fn set_mtime(path: &Path, time: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

/// Écrit un WAV PCM 16 bits stéréo à 44,1 kHz d'une seconde de silence
fn write_wav(path: &Path) {
    let data_len: u32 = 44_100 * 2 * 2;
    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&44_100u32.to_le_bytes());
    wav.extend_from_slice(&176_400u32.to_le_bytes());
    wav.extend_from_slice(&4u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(44 + data_len as usize, 0);
    fs::write(path, wav).unwrap();
}

/// Segment APP1 « Exif » : IFD0 (description, artiste) puis IFD Exif
/// (date de prise de vue), en petit-boutiste
fn exif_segment(description: &str, artist: &str, taken: &str) -> Vec<u8> {
    fn ascii(value: &str) -> Vec<u8> {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        bytes
    }

    fn entry(tiff: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: u32) {
        tiff.extend_from_slice(&tag.to_le_bytes());
        tiff.extend_from_slice(&kind.to_le_bytes());
        tiff.extend_from_slice(&count.to_le_bytes());
        tiff.extend_from_slice(&value.to_le_bytes());
    }

    const ASCII: u16 = 2;
    const LONG: u16 = 4;

    let (description, artist, taken) = (ascii(description), ascii(artist), ascii(taken));
    let ifd0: u32 = 8;
    let exif_ifd = ifd0 + 2 + 3 * 12 + 4;
    let description_at = exif_ifd + 2 + 12 + 4;
    let artist_at = description_at + description.len() as u32;
    let taken_at = artist_at + artist.len() as u32;

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&ifd0.to_le_bytes());

    tiff.extend_from_slice(&3u16.to_le_bytes());
    entry(&mut tiff, 0x010E, ASCII, description.len() as u32, description_at);
    entry(&mut tiff, 0x013B, ASCII, artist.len() as u32, artist_at);
    entry(&mut tiff, 0x8769, LONG, 1, exif_ifd);
    tiff.extend_from_slice(&0u32.to_le_bytes());

    tiff.extend_from_slice(&1u16.to_le_bytes());
    entry(&mut tiff, 0x9003, ASCII, taken.len() as u32, taken_at);
    tiff.extend_from_slice(&0u32.to_le_bytes());

    assert_eq!(tiff.len() as u32, description_at);
    tiff.extend(description);
    tiff.extend(artist);
    tiff.extend(taken);

    let mut segment = vec![0xFF, 0xE1];
    segment.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    segment.extend_from_slice(b"Exif\0\0");
    segment.extend(tiff);
    segment
}

#[test]
fn test_root_lists_mounts() {
    let dir = TempDir::new().unwrap();
    let music = dir.path().join("music");
    fs::create_dir(&music).unwrap();

    let cd = directory();
    let mount = cd.add_directory(&music).unwrap();
    assert_eq!(cd.get_system_update_id(), 1);

    let (didl, returned, total, _) = children(&cd, ROOT_ID);
    assert_eq!((returned, total), (1, 1));
    assert_eq!(ids(&didl), vec![mount]);

    let DidlObject::Container(container) = &didl.objects[0] else {
        panic!("a mount is a container");
    };
    assert_eq!(container.title, "music");
    assert_eq!(container.parent_id, "0");
    assert_eq!(container.class, "object.container");
    assert_eq!(container.child_count.as_deref(), Some("0"));
}

#[test]
fn test_root_metadata() {
    let dir = TempDir::new().unwrap();
    let cd = directory();
    cd.add_directory(dir.path()).unwrap();

    let DidlObject::Container(root) = metadata(&cd, ROOT_ID) else {
        panic!("root is a container");
    };
    assert_eq!(root.id, "0");
    assert_eq!(root.parent_id, "-1");
    assert_eq!(root.title, "Root");
    assert_eq!(root.child_count.as_deref(), Some("1"));
}

#[test]
fn test_files_are_sorted_items_with_fallback_metadata() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("b.mp3"), b"not really an mp3").unwrap();
    fs::write(dir.path().join("a.mp3"), b"not really an mp3 either").unwrap();

    let cd = directory();
    let mount = cd.add_directory(dir.path()).unwrap();

    let (didl, returned, total, _) = children(&cd, mount);
    assert_eq!((returned, total), (2, 2));
    assert_eq!(titles(&didl), vec!["a.mp3", "b.mp3"]);

    for item in didl.items() {
        assert_eq!(item.parent_id, mount.to_string());
        assert_eq!(item.class, "object.item.audioItem");
        assert!(item.date.is_some());

        let res = item.primary_resource().unwrap();
        assert_eq!(
            res.protocol_info,
            "http-get:*:audio/mpeg:DLNA.ORG_PN=MP3;DLNA.ORG_OP=01;DLNA.ORG_CI=0"
        );
        assert_eq!(
            res.url,
            format!("http://127.0.0.1:8080/ContentDirectory/{}/{}", mount, item.title)
        );
    }
}

#[test]
fn test_touching_a_file_bumps_versions() {
    let dir = TempDir::new().unwrap();
    let song = dir.path().join("a.mp3");
    fs::write(&song, b"x").unwrap();
    fs::write(dir.path().join("b.mp3"), b"y").unwrap();

    let cd = directory();
    let mount = cd.add_directory(dir.path()).unwrap();

    let (_, _, _, first_update) = children(&cd, mount);
    let first_system = cd.get_system_update_id();

    // une seconde consultation sans changement ne bouge rien
    let (_, _, _, same_update) = children(&cd, mount);
    assert_eq!(same_update, first_update);
    assert_eq!(cd.get_system_update_id(), first_system);

    set_mtime(&song, SystemTime::now() + Duration::from_secs(5));

    let (_, _, _, second_update) = children(&cd, mount);
    assert!(second_update > first_update);
    assert!(cd.get_system_update_id() > first_system);
    assert_eq!(
        cd.container_update_ids(),
        format!("{},{}", mount, second_update)
    );
}

#[test]
fn test_invalid_browse_flag_has_no_side_effect() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.mp3"), b"x").unwrap();

    let cd = directory();
    let mount = cd.add_directory(dir.path()).unwrap();
    let registered = cd.registry().len();
    let system = cd.get_system_update_id();

    let err = cd
        .browse(&mount.to_string(), "BrowseEverything", "*", 0, 0, "")
        .unwrap_err();
    assert!(matches!(err, ContentDirectoryError::InvalidArgument(_)));

    assert_eq!(cd.registry().len(), registered);
    assert_eq!(cd.get_system_update_id(), system);
    assert_eq!(cd.tracker().update_id_of(mount), 0);
}

#[test]
fn test_vanished_file_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let song = dir.path().join("a.mp3");
    fs::write(&song, b"x").unwrap();

    let cd = directory();
    let mount = cd.add_directory(dir.path()).unwrap();
    let (didl, _, _, _) = children(&cd, mount);
    let song_id = ids(&didl)[0];

    fs::remove_file(&song).unwrap();

    let err = cd
        .browse(&song_id.to_string(), "BrowseMetadata", "*", 0, 0, "")
        .unwrap_err();
    assert!(matches!(
        err,
        ContentDirectoryError::ObjectUnavailable { id, .. } if id == song_id
    ));
}

#[test]
fn test_vanished_mount_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let music = dir.path().join("music");
    fs::create_dir(&music).unwrap();

    let cd = directory();
    cd.add_directory(&music).unwrap();
    fs::remove_dir(&music).unwrap();

    let err = cd
        .browse("0", "BrowseDirectChildren", "*", 0, 0, "")
        .unwrap_err();
    assert!(matches!(err, ContentDirectoryError::ObjectUnavailable { .. }));
}

#[test]
fn test_ids_are_stable_and_bijective() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("album")).unwrap();
    fs::write(dir.path().join("album").join("01.mp3"), b"x").unwrap();
    fs::write(dir.path().join("cover.jpg"), b"x").unwrap();

    let cd = directory();
    let mount = cd.add_directory(dir.path()).unwrap();

    let (first, _, _, _) = children(&cd, mount);
    let (second, _, _, _) = children(&cd, mount);
    assert_eq!(ids(&first), ids(&second));

    let album = ids(&first)[0];
    let (tracks, _, _, _) = children(&cd, album);
    let track = ids(&tracks)[0];

    for id in [mount, album, track] {
        let path = cd.registry().path_of(id).unwrap();
        assert_eq!(cd.registry().resolve(&path).unwrap(), id);
    }
    assert_eq!(cd.registry().parent_of(track).unwrap(), Some(album));
    assert_eq!(cd.registry().parent_of(album).unwrap(), Some(mount));
    assert_eq!(cd.registry().mount_root_of(track).unwrap(), mount);
}

#[test]
fn test_metadata_is_idempotent() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub").join("x.txt"), b"hello").unwrap();

    let cd = directory();
    let mount = cd.add_directory(dir.path()).unwrap();
    let (didl, _, _, _) = children(&cd, mount);
    let sub = ids(&didl)[0];

    let first = cd.browse(&sub.to_string(), "BrowseMetadata", "*", 0, 0, "").unwrap();
    let second = cd.browse(&sub.to_string(), "BrowseMetadata", "*", 0, 0, "").unwrap();
    assert_eq!(first, second);

    let DidlObject::Container(container) = metadata(&cd, sub) else {
        panic!("a directory is a container");
    };
    assert_eq!(container.title, "sub");
    assert_eq!(container.parent_id, mount.to_string());
    assert_eq!(container.child_count.as_deref(), Some("1"));
}

#[test]
fn test_pagination_arguments_are_ignored() {
    let dir = TempDir::new().unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(dir.path().join(name), b"x").unwrap();
    }

    let cd = directory();
    let mount = cd.add_directory(dir.path()).unwrap();

    let response = cd
        .browse(&mount.to_string(), "BrowseDirectChildren", "dc:title", 1, 1, "-dc:title")
        .unwrap();
    assert_eq!(response.number_returned, 3);
    assert_eq!(response.total_matches, 3);
}

#[test]
fn test_unknown_object_ids() {
    let cd = directory();
    assert!(matches!(
        cd.browse("12", "BrowseDirectChildren", "*", 0, 0, ""),
        Err(ContentDirectoryError::InvalidObjectId(_))
    ));
    assert!(matches!(
        cd.browse("root", "BrowseMetadata", "*", 0, 0, ""),
        Err(ContentDirectoryError::InvalidObjectId(_))
    ));
}

#[test]
fn test_image_resource_attributes() {
    let dir = TempDir::new().unwrap();
    image::RgbImage::new(8, 6)
        .save(dir.path().join("cover.png"))
        .unwrap();

    let cd = directory();
    let mount = cd.add_directory(dir.path()).unwrap();
    let (didl, _, _, _) = children(&cd, mount);

    let item = didl.items().next().unwrap();
    assert_eq!(item.class, "object.item.imageItem");
    assert_eq!(item.title, "cover.png");
    let res = item.primary_resource().unwrap();
    assert_eq!(res.resolution.as_deref(), Some("8x6"));
    assert_eq!(res.color_depth.as_deref(), Some("24"));
    assert_eq!(res.bits_per_sample.as_deref(), Some("8"));
}

#[test]
fn test_audio_resource_attributes() {
    let dir = TempDir::new().unwrap();
    write_wav(&dir.path().join("silence.wav"));

    let cd = directory();
    let mount = cd.add_directory(dir.path()).unwrap();
    let (didl, _, _, _) = children(&cd, mount);

    let item = didl.items().next().unwrap();
    assert_eq!(item.class, "object.item.audioItem");
    assert_eq!(item.title, "silence.wav");
    let res = item.primary_resource().unwrap();
    assert_eq!(res.sample_frequency.as_deref(), Some("44100"));
    assert_eq!(res.nr_audio_channels.as_deref(), Some("2"));
    assert!(res.duration.as_deref().unwrap().starts_with("0:00:01"));
}

#[test]
fn test_playlists_and_unknown_files() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("list.m3u"), b"#EXTM3U\na.mp3\n").unwrap();
    fs::write(dir.path().join("blob"), b"\x00\x01\x02").unwrap();

    let cd = directory();
    let mount = cd.add_directory(dir.path()).unwrap();
    let (didl, _, _, _) = children(&cd, mount);

    let classes: Vec<&str> = didl.items().map(|i| i.class.as_str()).collect();
    assert_eq!(classes, vec!["object.item", "object.item.playlist"]);

    let blob = didl.items().next().unwrap();
    assert_eq!(
        blob.primary_resource().unwrap().protocol_info,
        "http-get:*:application/octet-stream:DLNA.ORG_OP=01;DLNA.ORG_CI=0"
    );
}

#[test]
fn test_result_is_well_formed_didl() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("z-dir")).unwrap();
    fs::write(dir.path().join("a & b.txt"), b"x").unwrap();

    let cd = directory();
    let mount = cd.add_directory(dir.path()).unwrap();
    let response = cd
        .browse(&mount.to_string(), "BrowseDirectChildren", "*", 0, 0, "")
        .unwrap();

    assert!(response.result.contains("urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/"));
    assert!(response.result.contains("restricted=\"1\""));

    let didl = DIDLLite::parse(&response.result).unwrap();
    assert_eq!(titles(&didl), vec!["a & b.txt", "z-dir"]);
    assert!(!didl.objects[0].is_container());
    assert!(didl.objects[1].is_container());
    assert_eq!(
        didl.items().next().unwrap().primary_resource().unwrap().url,
        format!("http://127.0.0.1:8080/ContentDirectory/{}/a%20&%20b.txt", mount)
    );
}

#[test]
fn test_tagged_audio_fields() {
    let dir = TempDir::new().unwrap();
    let song = dir.path().join("track.wav");
    write_wav(&song);

    let mut tag = Tag::new(TagType::Id3v2);
    tag.set_title("Blue in Green".to_string());
    tag.set_artist("Miles Davis".to_string());
    tag.set_album("Kind of Blue".to_string());
    tag.set_genre("(8)".to_string());
    tag.set_track(3);
    tag.set_year(1959);
    tag.insert_text(ItemKey::Publisher, "Columbia".to_string());
    tag.save_to_path(&song, WriteOptions::default()).unwrap();

    let cd = directory();
    let mount = cd.add_directory(dir.path()).unwrap();
    let (didl, _, _, _) = children(&cd, mount);

    let item = didl.items().next().unwrap();
    assert_eq!(item.class, "object.item.audioItem");
    assert_eq!(item.title, "Blue in Green");
    assert_eq!(item.creator.as_deref(), Some("Miles Davis"));
    assert_eq!(item.artist.as_deref(), Some("Miles Davis"));
    assert_eq!(item.album.as_deref(), Some("Kind of Blue"));
    assert_eq!(item.genre.as_deref(), Some("Jazz"));
    assert_eq!(item.original_track_number.as_deref(), Some("3"));
    assert_eq!(item.date.as_deref(), Some("1959-01-01"));
    assert_eq!(item.publisher.as_deref(), Some("Columbia"));

    let res = item.primary_resource().unwrap();
    assert_eq!(res.sample_frequency.as_deref(), Some("44100"));
    assert_eq!(
        res.url,
        format!("http://127.0.0.1:8080/ContentDirectory/{}/track.wav", mount)
    );
}

#[test]
fn test_exif_fields_override_image_defaults() {
    let dir = TempDir::new().unwrap();
    let photo = dir.path().join("IMG_0001.jpg");
    image::RgbImage::new(6, 4).save(&photo).unwrap();

    let jpeg = fs::read(&photo).unwrap();
    let mut tagged = jpeg[..2].to_vec();
    tagged.extend(exif_segment("Sunset over the bay", "Ansel Adams", "2021:07:14 18:30:05"));
    tagged.extend_from_slice(&jpeg[2..]);
    fs::write(&photo, tagged).unwrap();

    let cd = directory();
    let mount = cd.add_directory(dir.path()).unwrap();
    let (didl, _, _, _) = children(&cd, mount);

    let item = didl.items().next().unwrap();
    assert_eq!(item.class, "object.item.imageItem");
    assert_eq!(item.title, "Sunset over the bay");
    assert_eq!(item.creator.as_deref(), Some("Ansel Adams"));
    assert_eq!(item.artist.as_deref(), Some("Ansel Adams"));
    assert!(item.date.as_deref().unwrap().starts_with("2021-07-14T18:30:05"));
    assert_eq!(
        item.primary_resource().unwrap().resolution.as_deref(),
        Some("6x4")
    );
}

#[cfg(unix)]
#[test]
fn test_non_utf8_names_are_browsable() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = TempDir::new().unwrap();
    let raw = OsStr::from_bytes(b"caf\xe9.mp3");
    fs::write(dir.path().join("a.mp3"), b"x").unwrap();
    fs::write(dir.path().join(raw), b"x").unwrap();

    let cd = directory();
    let mount = cd.add_directory(dir.path()).unwrap();

    let (didl, returned, total, _) = children(&cd, mount);
    assert_eq!((returned, total), (2, 2));
    assert_eq!(titles(&didl), vec!["a.mp3", "caf\u{FFFD}.mp3"]);

    let cafe = ids(&didl)[1];
    assert_eq!(cd.registry().path_of(cafe).unwrap(), dir.path().join(raw));
    assert_eq!(
        didl.items().nth(1).unwrap().primary_resource().unwrap().url,
        format!("http://127.0.0.1:8080/ContentDirectory/{}/caf%E9.mp3", mount)
    );

    let DidlObject::Item(item) = metadata(&cd, cafe) else {
        panic!("a file is an item");
    };
    assert_eq!(item.parent_id, mount.to_string());
}

#[test]
fn test_parent_of_a_mount_is_refused() {
    let dir = TempDir::new().unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("a.txt"), b"x").unwrap();

    let cd = directory();
    let sub_id = cd.add_directory(&sub).unwrap();
    children(&cd, sub_id);

    assert!(matches!(
        cd.add_directory(dir.path()),
        Err(ContentDirectoryError::InvalidArgument(_))
    ));
    assert_eq!(cd.directories(), vec![sub]);

    let DidlObject::Container(container) = metadata(&cd, sub_id) else {
        panic!("a mount is a container");
    };
    assert_eq!(container.parent_id, "0");
    let (root, _, _, _) = children(&cd, ROOT_ID);
    assert_eq!(ids(&root), vec![sub_id]);
}
