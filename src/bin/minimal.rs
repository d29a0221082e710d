// Minimal smoke run of the in-process pieces; needs neither ffmpeg nor a font

use frame_studio::{
    edits::{EditPipeline, EditRegistry},
    edits::EditContext,
    imaging::{primitives, qr::qr_code, stitch_side_by_side, StitchItem},
    video::{assembler::plan_frame_order, FreezePolicy, Frame},
};
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Testing frame-studio core functionality");

    // Test 1: Edit Registry
    println!("\n1. Edit registry...");
    let registry = EditRegistry::new();
    let available = registry.available_edits();
    println!("   Available edits: {:?}", available);
    assert_eq!(available.len(), 6);

    // Test 2: Edit pipeline on a synthetic frame
    println!("\n2. Edit pipeline...");
    let pipeline = EditPipeline::parse(&["rotate:degrees=90", "invert", "resize:scale=0.5"])?.resolve(&registry)?;
    let mut frame = Frame::new_filled(200, 150, [100, 150, 200]);
    let context = EditContext {
        source: Path::new("synthetic.png"),
        painter: None,
        subtitle_fraction: 0.1,
    };
    pipeline.apply(&mut frame, &context)?;
    println!("   Result: {}x{}, pixel {:?}", frame.width(), frame.height(), frame.get_pixel(0, 0));
    assert_eq!(frame.dimensions(), (75, 100));

    // Test 3: Side-by-side stitching
    println!("\n3. Side-by-side stitching...");
    let items = vec![StitchItem::new(frame.clone()), StitchItem::new(qr_code("frame-studio", 4)?)];
    let stitched = stitch_side_by_side(&items, None, 0.1)?;
    println!("   Stitched: {}x{}", stitched.width(), stitched.height());

    match primitives::save(&stitched, Path::new("minimal_test_output.png"), &Default::default()) {
        Ok(path) => println!("   Output saved to: {}", path.display()),
        Err(e) => println!("   Could not save file: {}", e),
    }

    // Test 4: Freeze planning
    println!("\n4. Freeze planning...");
    let order = plan_frame_order(30, &FreezePolicy::new([10], true, 1.0), 30.0);
    println!("   30 frames with two 1s holds -> {} encoded frames", order.len());
    assert_eq!(order.len(), 90);

    println!("\nAll checks passed.");
    Ok(())
}
