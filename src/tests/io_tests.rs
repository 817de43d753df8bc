use std::io::Write;
use std::path::Path;

use ndframes::backends::raw_stack::RawLayout;
use ndframes::{MetadataField, MetadataValue, OpenOptions, PixelType};

/// Writes `cells_t{t}z{z}.png` for every `(t, z)`, each plane
/// filled with `10 * t + z`.
fn write_tz_pngs(dir : &Path, t_size : u8, z_size : u8, shape : (u32, u32)) {
    for t in 0..t_size {
        for z in 0..z_size {
            let value = 10 * t + z;
            let img = image::GrayImage::from_pixel(shape.1, shape.0, image::Luma([value]));
            // 1-based indices, as microscopes like to write them
            img.save(dir.join(format!("cells_t{:03}z{:02}.png", t + 1, z + 1))).unwrap();
        }
    }
}

#[test]
fn image_sequence_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_tz_pngs(dir.path(), 3, 4, (6, 5));

    let frames = ndframes::open(dir.path()).unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames.iter_axes(), &["t".to_string()]);
    assert_eq!(frames.bundle_axes(), &["z".to_string()]);
    assert_eq!(frames.frame_shape(), vec![4, 6, 5]);
    assert_eq!(frames.pixel_type(), PixelType::U8);

    let frame = frames.get_frame(-1).unwrap();
    let data = frame.as_array::<u8>().unwrap();
    for z in 0..4 {
        assert!(data.index_axis(ndarray::Axis(0), z).iter().all(|&v| v == 20 + z as u8));
    }
    match &frame.metadata["filename"] {
        MetadataField::PerPlane(names) => {
            assert_eq!(names.len(), 4);
            assert_eq!(names[0], Some(MetadataValue::Text("cells_t003z01.png".to_string())));
        },
        other => panic!("expected per-plane filenames, got {:?}", other),
    }
}

#[test]
fn image_sequence_reconfigured() {
    let dir = tempfile::tempdir().unwrap();
    write_tz_pngs(dir.path(), 2, 3, (4, 4));

    let options = OpenOptions::default()
        .with_extension("png")
        .with_pixel_type(PixelType::F32)
        .with_parallel(true)
        .with_chunk_size(2);
    let mut frames = ndframes::open_with(dir.path(), &options).unwrap();
    assert!(frames.is_parallel());
    assert_eq!(frames.chunk_size(), 2);

    // t is already iterated over
    frames.set_bundle_axes(&["t"]).unwrap_err();
    frames.set_iter_axes(&["z"]).unwrap_err();

    frames.set_bundle_axes::<&str>(&[]).unwrap();
    frames.set_iter_axes(&["z"]).unwrap();
    frames.set_bundle_axes(&["t"]).unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames.frame_shape(), vec![2, 4, 4]);

    let parallel = frames.get_frame(2).unwrap();
    frames.set_parallel(false);
    assert_eq!(parallel, frames.get_frame(2).unwrap());
    let data = parallel.as_array::<f32>().unwrap();
    assert_eq!(data[[1, 0, 0]], 12.0);

    let collected = frames.slice(None, None, -1).unwrap().collect_parallel().unwrap();
    let order : Vec<usize> = collected.iter().map(|f| f.frame_no).collect();
    assert_eq!(order, vec![2, 1, 0]);
}

#[test]
fn rgb_planes_keep_their_samples() {
    let dir = tempfile::tempdir().unwrap();
    for t in 0..2u8 {
        let img = image::RgbImage::from_pixel(3, 2, image::Rgb([t, 100, 200]));
        img.save(dir.path().join(format!("rgb_t{}.png", t))).unwrap();
    }

    let frames = ndframes::open(dir.path()).unwrap();
    assert_eq!(frames.frame_shape(), vec![2, 3, 3]);
    let frame = frames.get_frame(1).unwrap();
    let data = frame.as_array::<u8>().unwrap();
    assert_eq!(data[[1, 2, 0]], 1);
    assert_eq!(data[[0, 0, 2]], 200);
}

#[test]
fn raw_stack_through_open_with() {
    let mut file = tempfile::Builder::new().suffix(".raw").tempfile().unwrap();
    file.write_all(&[0u8; 32]).unwrap();
    for plane in 0..6u16 {
        for px in 0..12u16 {
            file.write_all(&(plane * 100 + px).to_le_bytes()).unwrap();
        }
    }
    file.flush().unwrap();

    let layout = RawLayout::new(3, 4, PixelType::U16)
        .with_endian(binrw::Endian::Little)
        .with_header(32)
        .with_axes(&[("t", 3), ("c", 2)]);
    let mut frames = ndframes::open_with(
        file.path(),
        &OpenOptions::default().with_raw_layout(layout),
    ).unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames.frame_shape(), vec![3, 4]);

    frames.set_bundle_axes(&["c"]).unwrap();
    let frame = frames.get_frame(1).unwrap();
    assert_eq!(frame.shape(), &[2, 3, 4]);
    let data = frame.as_array::<u16>().unwrap();
    assert_eq!(data[[0, 0, 0]], 200);
    assert_eq!(data[[1, 2, 3]], 311);
    assert_eq!(
        frame.metadata["plane"],
        MetadataField::PerPlane(vec![Some(MetadataValue::Int(2)), Some(MetadataValue::Int(3))])
    );
}

#[test]
fn unknown_files_have_no_backend() {
    let file = tempfile::Builder::new().suffix(".xyz").tempfile().unwrap();
    assert!(matches!(ndframes::open(file.path()), Err(ndframes::FramesError::NoBackend(_))));
}
