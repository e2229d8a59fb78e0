use e8_core::arch::{self, Opcode};
use e8_core::build;
use e8_core::image::{self, SectionKind};
use e8_core::ir::{ArithOp, FuncSig, Pkg, Ref};
use e8_core::link::{self, Fill, Func, Job, LinkError, Var};
use e8_core::logger::init_logger_debug;
use log::info;

fn read_word(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

#[test]
fn hello_image_is_a_single_code_section() {
    init_logger_debug();

    let builtin = link::Pkg::new_ref("builtin");
    {
        let mut b = builtin.borrow_mut();
        b.declare_func("halt");
        let mut halt = Func::new();
        halt.add_inst(0); // the all-zero halt word
        b.define_func("halt", halt);
    }

    let app = link::Pkg::new_ref("app");
    {
        let mut a = app.borrow_mut();
        a.import(&builtin);
        a.declare_func("main");
        let mut main = Func::new();
        main.add_inst(arch::jump(Opcode::JAL, 0));
        main.add_link(Fill::Link, "builtin", "halt");
        a.define_func("main", main);
    }

    let mut out = Vec::new();
    link::link_main(&app, &mut out, "main").unwrap();
    let secs = image::read(&out).unwrap();

    assert_eq!(secs.len(), 1);
    let code = &secs[0];
    assert_eq!(code.header.kind, SectionKind::Code);
    assert_eq!(code.header.addr, arch::INIT_PC);
    // two instructions, 4 bytes each
    assert_eq!(code.header.size, 8);

    // the first instruction is the call; halt sits right behind it, so
    // the patched displacement is zero
    let call = read_word(&code.bytes, 0);
    assert_eq!(arch::opcode(call), Some(Opcode::JAL));
    assert_eq!(arch::jump_disp(call), 0);
    assert_eq!(read_word(&code.bytes, 4), 0);
}

#[test]
fn cross_package_call_encodes_the_relative_displacement() {
    init_logger_debug();

    let mut b = Pkg::new("b");
    b.new_func("F", FuncSig::void()).new_block();
    let f_ref = b.func_ref("F");
    let b_lib = build::compile(&mut b, &[]).unwrap();

    let mut a = Pkg::new("a");
    {
        let main = a.new_func("main", FuncSig::void());
        let entry = main.new_block();
        main.block_mut(entry)
            .call(vec![], f_ref, FuncSig::void(), vec![]);
    }
    let a_lib = build::compile(&mut a, &[b_lib.clone()]).unwrap();

    let mut out = Vec::new();
    Job {
        pkg: a_lib.clone(),
        start_sym: "main".to_string(),
        init_pc: 0x1000,
    }
    .link(&mut out)
    .unwrap();

    let secs = image::read(&out).unwrap();
    assert_eq!(secs.len(), 1);
    let code = &secs[0];
    assert_eq!(code.header.addr, 0x1000);

    // addresses were written back during layout
    let main_addr = a_lib.borrow().func("main").unwrap().addr();
    let f_addr = b_lib.borrow().func("F").unwrap().addr();
    assert_eq!(main_addr, 0x1000);
    assert!(f_addr > main_addr);

    // find the call site and check its displacement
    let site = a_lib.borrow().func("main").unwrap().links()[0].inst_offset();
    let call_addr = main_addr + site;
    let call = read_word(&code.bytes, site as usize);
    assert_eq!(arch::opcode(call), Some(Opcode::JAL));
    let want = (f_addr as i64 - (call_addr as i64 + 4)) >> 2;
    assert_eq!(arch::jump_disp(call) as i64, want);
    info!("call at 0x{call_addr:x} jumps {want} words to 0x{f_addr:x}");
}

#[test]
fn var_layout_packs_data_and_zeros_behind_the_code() {
    init_logger_debug();

    let app = link::Pkg::new_ref("app");
    {
        let mut a = app.borrow_mut();
        a.declare_func("main");
        let mut main = Func::new();
        main.add_inst(arch::imm(Opcode::LUI, arch::Reg::R1, arch::Reg::R0, 0));
        main.add_link(Fill::High, "app", "w");
        main.add_inst(arch::imm(Opcode::ORI, arch::Reg::R1, arch::Reg::R1, 0));
        main.add_link(Fill::Low, "app", "w");
        main.add_inst(arch::imm(Opcode::LUI, arch::Reg::R2, arch::Reg::R0, 0));
        main.add_link(Fill::High, "app", "z");
        main.add_inst(arch::imm(Opcode::ORI, arch::Reg::R2, arch::Reg::R2, 0));
        main.add_link(Fill::Low, "app", "z");
        a.define_func("main", main);

        a.declare_var("w");
        let mut w = Var::new(4);
        w.write(&[1, 2, 3, 4]);
        a.define_var("w", w);

        a.declare_var("z");
        let mut z = Var::new(4);
        z.zeros(8);
        a.define_var("z", z);
    }

    let mut out = Vec::new();
    link::link_main(&app, &mut out, "main").unwrap();
    let secs = image::read(&out).unwrap();
    assert_eq!(secs.len(), 3);

    let (code, data, zeros) = (&secs[0], &secs[1], &secs[2]);
    assert_eq!(code.header.kind, SectionKind::Code);
    assert_eq!(data.header.kind, SectionKind::Data);
    assert_eq!(zeros.header.kind, SectionKind::Zeros);

    // data follows the code immediately, 4-byte aligned
    assert_eq!(data.header.addr, code.header.addr + code.header.size);
    assert_eq!(data.header.addr % 4, 0);
    assert_eq!(data.header.size, 4);
    assert_eq!(data.bytes, [1, 2, 3, 4]);

    // zeros follow the data
    assert_eq!(zeros.header.addr, data.header.addr + 4);
    assert_eq!(zeros.header.size, 8);
    assert!(zeros.bytes.is_empty());

    // the patched address bits agree with the layout
    let lo_w = read_word(&code.bytes, 4);
    assert_eq!(arch::imm16(lo_w) as u32, data.header.addr & 0xffff);
    let lo_z = read_word(&code.bytes, 12);
    assert_eq!(arch::imm16(lo_z) as u32, zeros.header.addr & 0xffff);
}

#[test]
fn missing_start_function_produces_no_image() {
    init_logger_debug();

    let app = link::Pkg::new_ref("app");
    {
        let mut a = app.borrow_mut();
        a.declare_func("main");
        let mut f = Func::new();
        f.add_inst(0);
        a.define_func("main", f);
    }

    let mut out = Vec::new();
    let err = link_err(&app, &mut out, "nope");
    assert!(matches!(err, LinkError::StartFuncMissing));
    assert_eq!(err.to_string(), "start function missing");
    assert!(out.is_empty());
}

fn link_err(pkg: &link::PkgRef, out: &mut Vec<u8>, start: &str) -> LinkError {
    link::link_main(pkg, out, start).unwrap_err()
}

#[test]
fn string_literals_deduplicate_into_one_data_symbol() {
    init_logger_debug();

    let mut app = Pkg::new("app");
    let s1 = app.new_string("hi");
    let s2 = app.new_string("hi");
    assert_eq!(s1, s2);

    {
        let main = app.new_func("main", FuncSig::void());
        let entry = main.new_block();
        let t1 = main.new_temp(8, false, true);
        let t2 = main.new_temp(8, false, true);
        let block = main.block_mut(entry);
        block.comment("materialize the same literal twice");
        block.arith(t1, None, ArithOp::MakeStr, Some(s1));
        block.arith(t2, None, ArithOp::MakeStr, Some(s2));
    }

    let lib = build::compile(&mut app, &[]).unwrap();
    assert_eq!(lib.borrow().var(":str_0").unwrap().bytes(), b"hi");
    assert!(lib.borrow().var(":str_1").is_none());

    let mut out = Vec::new();
    link::link_main(&lib, &mut out, "main").unwrap();
    let secs = image::read(&out).unwrap();

    let data = secs
        .iter()
        .find(|s| s.header.kind == SectionKind::Data)
        .expect("string constant must land in the data section");
    assert_eq!(data.bytes, b"hi");
    assert_eq!(data.header.size, 2);
}

#[test]
fn linking_twice_is_byte_identical() {
    init_logger_debug();

    fn build_once() -> Vec<u8> {
        let mut b = Pkg::new("b");
        b.new_func("F", FuncSig::void()).new_block();
        let f_ref = b.func_ref("F");
        let b_lib = build::compile(&mut b, &[]).unwrap();

        let mut a = Pkg::new("a");
        let s = a.new_string("greetings");
        {
            let main = a.new_func("main", FuncSig::void());
            let entry = main.new_block();
            let t = main.new_temp(8, false, true);
            let g = main.new_temp(4, false, true);
            let block = main.block_mut(entry);
            block.arith(t, None, ArithOp::MakeStr, Some(s));
            block.zero(g.clone());
            block.arith(
                g.clone(),
                Some(g.clone()),
                ArithOp::Add,
                Some(Ref::Num(3)),
            );
            block.call(vec![], f_ref, FuncSig::void(), vec![]);
        }
        build::build_main(&mut a, &[b_lib]).unwrap()
    }

    let first = build_once();
    let second = build_once();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn code_address_space_can_overflow() {
    init_logger_debug();

    let app = link::Pkg::new_ref("app");
    {
        let mut a = app.borrow_mut();
        a.declare_func("main");
        let mut f = Func::new();
        for _ in 0..4 {
            f.add_inst(0);
        }
        a.define_func("main", f);
    }

    let mut out = Vec::new();
    let err = Job {
        pkg: app,
        start_sym: "main".to_string(),
        init_pc: 0xffff_fff4,
    }
    .link(&mut out)
    .unwrap_err();
    assert!(matches!(err, LinkError::CodeTooLarge));
    assert_eq!(err.to_string(), "code section too large");
}

#[test]
fn bare_func_round_trips_through_the_loader() {
    init_logger_debug();

    let mut f = Func::new();
    f.add_inst(arch::imm(Opcode::ORI, arch::Reg::R1, arch::Reg::R0, 41));
    f.add_inst(arch::imm(Opcode::ADDI, arch::Reg::R1, arch::Reg::R1, 1));
    f.add_inst(0);

    let bytes = link::link_bare_func(&f).unwrap();
    let secs = image::read(&bytes).unwrap();
    assert_eq!(secs.len(), 1);
    assert_eq!(secs[0].header.addr, arch::INIT_PC);
    assert_eq!(secs[0].header.size, 12);
    assert_eq!(read_word(&secs[0].bytes, 8), 0);
}
