// apps/cf_cli/src/demo.rs

//! 演示组件
//!
//! `cf.demo.Solver` 只模拟求解器的外形：带校验的选项、受限的格式
//! 选择、`solve` 与 `fail` 两个信号。残差按迭代次数和 rank 算出，
//! 结果确定，便于比较本地与远程应答。

use cf_component::prelude::*;
use std::sync::Arc;

/// 演示求解器类型名
pub const SOLVER_TYPE: &str = "cf.demo.Solver";

/// 可选的数值格式
pub const SCHEMES: [&str; 3] = ["hllc", "roe", "rusanov"];

/// 演示求解器
#[derive(Debug, Default)]
pub struct Solver {
    iterations: i64,
}

impl Component for Solver {
    fn define(&mut self, def: &mut Definition<'_>) -> CfResult<()> {
        def.options
            .add_option_with_validator("cfl", 0.5, |v| match v.as_real() {
                Some(c) if c > 0.0 && c <= 1.0 => Ok(()),
                _ => Err("CFL 必须在 (0, 1] 内".to_string()),
            })?
            .describe("CFL 数")
            .with_pretty_name("CFL")
            .mark_basic();
        def.options
            .add_option_with_validator("max_iterations", 100_i64, |v| match v.as_int() {
                Some(n) if n > 0 => Ok(()),
                _ => Err("最大迭代次数必须为正".to_string()),
            })?
            .describe("单次 solve 的最大迭代次数")
            .mark_basic();
        def.options
            .add_option("scheme", "hllc")?
            .restricted_to(SCHEMES)?
            .describe("通量格式");
        def.options
            .add_option("rank", 0_i64)?
            .describe("所在工作者的 rank");
        def.properties.set("iterations", 0_i64);

        def.signals
            .register("solve", "执行一次求解", solve)?
            .with_signature(
                ArgumentFrame::new()
                    .with("iterations", 0_i64)
                    .with("fail_rank", -1_i64),
            );
        def.signals.register("fail", "总是失败", |ctx| {
            Err(CfError::application("按要求失败", ctx.path()?.to_string()))
        })?;
        def.tag("solver");
        Ok(())
    }
}

fn solve(ctx: &mut SignalContext<'_>) -> CfResult<ArgumentFrame> {
    let options = ctx.options()?;
    let rank = options.value::<i64>("rank")?;
    let cfl = options.value::<f64>("cfl")?;
    let max_iterations = options.value::<i64>("max_iterations")?;
    let scheme = options.value::<String>("scheme")?;

    if rank == ctx.args.value::<i64>("fail_rank")? {
        return Err(CfError::application(
            format!("rank {} 发散", rank),
            ctx.path()?.to_string(),
        ));
    }

    let requested = ctx.args.value::<i64>("iterations")?;
    let iterations = if requested > 0 {
        requested.min(max_iterations)
    } else {
        max_iterations
    };
    let residual = (1.0 - cfl).max(0.05).powi(iterations as i32) / (rank as f64 + 1.0);

    let solver = ctx.component_mut::<Solver>()?;
    solver.iterations += iterations;
    let total = solver.iterations;
    ctx.properties_mut()?.set("iterations", total);

    Ok(ArgumentFrame::new()
        .with("rank", rank)
        .with("iterations", iterations)
        .with("residual", residual)
        .with("scheme", scheme))
}

/// 含核心构建器与演示组件的注册表
pub fn registry() -> CfResult<Arc<BuilderRegistry>> {
    let mut registry = BuilderRegistry::with_core_builders();
    registry.register_default::<Solver>(SOLVER_TYPE)?;
    Ok(registry.into_shared())
}

/// 把树内所有演示求解器的 rank 设为给定值
pub fn assign_rank(tree: &mut ComponentTree, rank: usize) -> CfResult<()> {
    let solvers = tree.find_by_type(tree.root(), SOLVER_TYPE);
    for id in solvers {
        tree.options_mut(id)?.set("rank", rank as i64)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (ComponentTree, ComponentId) {
        let mut tree = ComponentTree::new(registry().unwrap());
        let root = tree.root();
        let solver = tree.create_child(root, SOLVER_TYPE, "solver1").unwrap();
        (tree, solver)
    }

    #[test]
    fn test_solve_is_deterministic() {
        let (mut a, sa) = tree();
        let (mut b, sb) = tree();
        let args = ArgumentFrame::new().with("iterations", 10_i64);
        let ra = a.call_signal(sa, "solve", args.clone()).unwrap();
        let rb = b.call_signal(sb, "solve", args).unwrap();
        assert_eq!(ra, rb);
        assert_eq!(ra.value::<i64>("iterations").unwrap(), 10);
        assert_eq!(a.properties(sa).unwrap().value::<i64>("iterations").unwrap(), 10);
    }

    #[test]
    fn test_options_are_guarded() {
        let (mut t, s) = tree();
        let options = t.options_mut(s).unwrap();
        assert!(options.set("cfl", 1.5).is_err());
        assert!(options.set("scheme", "upwind").is_err());
        options.set("scheme", "roe").unwrap();
        assert_eq!(options.value::<String>("scheme").unwrap(), "roe");
    }

    #[test]
    fn test_assign_rank_and_fail() {
        let (mut t, s) = tree();
        assign_rank(&mut t, 2).unwrap();
        let err = t
            .call_signal(s, "solve", ArgumentFrame::new().with("fail_rank", 2_i64))
            .unwrap_err();
        assert!(err.to_string().contains("rank 2"));
        assert!(t.call_signal(s, "fail", ArgumentFrame::new()).is_err());
    }
}
